use redb::TableDefinition;

/// Users: uuid -> UserRecord (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Username index: username -> user uuid
pub const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Email index: lowercased email -> user uuid
pub const EMAILS: TableDefinition<&str, &str> = TableDefinition::new("emails");

/// Posts: uuid -> PostRecord (msgpack)
pub const POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");

/// Owner index: user uuid -> msgpack Vec of post UUIDs, in creation order
pub const OWNER_POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_posts");

/// Images: uuid -> ImageRecord (msgpack)
pub const IMAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("images");

/// Comments: uuid -> CommentRecord (msgpack)
pub const COMMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("comments");

/// Drafts: user uuid -> DraftRecord (msgpack)
pub const DRAFTS: TableDefinition<&str, &[u8]> = TableDefinition::new("drafts");

/// Media objects awaiting a retried delete: filename -> OrphanedMedia (msgpack)
pub const ORPHANED_MEDIA: TableDefinition<&str, &[u8]> = TableDefinition::new("orphaned_media");
