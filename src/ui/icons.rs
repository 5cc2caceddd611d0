pub struct Icons;

impl Icons {
    pub const DATABASE: &str = "🗄️";
    pub const SCRIPT: &str = "📝";
    pub const SAVE: &str = "💾";
    pub const LINK: &str = "🔗";
    pub const PERSON: &str = "👤";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const SKIP: &str = "⏭️";
    pub const EMPTY: &str = "∅";
}
