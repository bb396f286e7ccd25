//! Database schema definitions

/// SQL to create the documents table
pub const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    source_id TEXT NOT NULL
)
"#;

/// SQL to create the canonical_content table
pub const CREATE_CANONICAL_CONTENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS canonical_content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL UNIQUE
)
"#;

/// SQL to create the symbols table
pub const CREATE_SYMBOLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    content_id INTEGER NOT NULL REFERENCES canonical_content(id)
)
"#;

/// SQL to create the geometries table
pub const CREATE_GEOMETRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS geometries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page INTEGER NOT NULL,
    "left" REAL NOT NULL,
    "top" REAL NOT NULL,
    width REAL NOT NULL,
    height REAL NOT NULL
)
"#;

/// SQL to create the symbol_geometries join table
pub const CREATE_SYMBOL_GEOMETRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_geometries (
    symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    geometry_id INTEGER NOT NULL REFERENCES geometries(id)
)
"#;

/// SQL to create the symbol_matches table
pub const CREATE_SYMBOL_MATCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_matches (
    source_symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    target_symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    rank INTEGER NOT NULL
)
"#;

/// SQL to create the symbol_children join table
pub const CREATE_SYMBOL_CHILDREN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_children (
    parent_symbol_id INTEGER NOT NULL REFERENCES symbols(id),
    child_symbol_id INTEGER NOT NULL REFERENCES symbols(id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_symbols_document ON symbols(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbol_geometries_symbol ON symbol_geometries(symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbol_matches_source ON symbol_matches(source_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbol_children_parent ON symbol_children(parent_symbol_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DOCUMENTS_TABLE,
        CREATE_CANONICAL_CONTENT_TABLE,
        CREATE_SYMBOLS_TABLE,
        CREATE_GEOMETRIES_TABLE,
        CREATE_SYMBOL_GEOMETRIES_TABLE,
        CREATE_SYMBOL_MATCHES_TABLE,
        CREATE_SYMBOL_CHILDREN_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
