//! Naming rules for entities and the create-mutation types derived from them.
//!
//! Table `books` becomes type `Book`, mutation field `createBook`, and the
//! result union `CreateBookResult`.

/// `book_authors` -> `BookAuthors`, `created_at` -> `CreatedAt`.
pub fn upper_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for segment in s.split(['_', '-', ' ']).filter(|seg| !seg.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// `create-book` -> `createBook`.
pub fn camel_case(s: &str) -> String {
    let upper = upper_camel_case(s);
    let mut chars = upper.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Singularizes an English plural word. Handles the regular forms that show
/// up in table names; irregular plurals need an explicit type name.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(stem) = lower.strip_suffix("ies")
        && !stem.is_empty()
    {
        return format!("{}y", &word[..stem.len()]);
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    match lower.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => word[..stem.len()].to_string(),
        _ => word.to_string(),
    }
}

/// `books` -> `Book`, `book_authors` -> `BookAuthor`. Only the last segment
/// of a compound table name is singularized.
pub fn type_name(table: &str) -> String {
    match table.rsplit_once('_') {
        Some((head, last)) => upper_camel_case(&format!("{head}_{}", singularize(last))),
        None => upper_camel_case(&singularize(table)),
    }
}

/// Names the create mutation and its companion types for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNames {
    pub table: String,
    pub type_name: String,
}

impl EntityNames {
    pub fn new(table: &str, type_name: Option<&str>) -> Self {
        Self {
            table: table.to_string(),
            type_name: type_name.map_or_else(|| self::type_name(table), str::to_string),
        }
    }

    pub fn create_field(&self) -> String {
        camel_case(&format!("create-{}", self.type_name))
    }

    pub fn create_input_type(&self) -> String {
        upper_camel_case(&format!("{}-input", self.create_field()))
    }

    pub fn create_payload_type(&self) -> String {
        upper_camel_case(&format!("{}-payload", self.create_field()))
    }

    pub fn create_result_type(&self) -> String {
        upper_camel_case(&format!("{}-result", self.create_field()))
    }

    /// Field on the payload carrying the created row, e.g. `book`.
    pub fn table_field(&self) -> String {
        camel_case(&self.type_name)
    }

    /// Variant name for a conflict on `columns`, e.g. `UserUsernameConflict`.
    pub fn conflict_type(&self, columns: &[String]) -> String {
        let mut name = self.type_name.clone();
        for column in columns {
            name.push_str(&upper_camel_case(column));
        }
        name.push_str("Conflict");
        name
    }
}
