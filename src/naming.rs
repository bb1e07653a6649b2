//! Name derivation for operations and generated types: entity names are
//! PascalCase as declared; operation names are camelCase with a naive
//! English plural.

/// Lowercase the first character, leave the rest untouched.
/// e.g. "TodoAssignee" -> "todoAssignee"
pub fn to_camel(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Uppercase the first character, leave the rest untouched.
pub fn to_pascal(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Join segments into one camelCase identifier.
/// e.g. ["new", "User", "todos", "Edge"] -> "newUserTodosEdge"
pub fn camel_join(segments: &[&str]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(&to_camel(seg));
        } else {
            out.push_str(&to_pascal(seg));
        }
    }
    out
}

/// Naive English pluralization, enough for entity names.
/// e.g. "User" -> "Users", "Category" -> "Categories", "Boss" -> "Bosses"
pub fn plural(s: &str) -> String {
    if let Some(stem) = s.strip_suffix('y') {
        let penultimate = stem.chars().last().unwrap_or('a');
        if !matches!(penultimate, 'a' | 'e' | 'i' | 'o' | 'u') {
            return format!("{stem}ies");
        }
    }
    if s.ends_with('s') || s.ends_with('x') || s.ends_with('z') || s.ends_with("ch") || s.ends_with("sh") {
        return format!("{s}es");
    }
    format!("{s}s")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    FindById,
    FindAll,
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    CreateOne,
    Create,
    UpdateOne,
    Update,
    BatchUpdate,
    DeleteOne,
    Delete,
}

/// Root query field name for an entity.
pub fn query_name(entity: &str, kind: QueryKind) -> String {
    match kind {
        QueryKind::FindById => to_camel(entity),
        QueryKind::FindAll => to_camel(&plural(entity)),
        QueryKind::Count => format!("{}Count", to_camel(entity)),
    }
}

/// Root mutation field name for an entity.
pub fn mutation_name(entity: &str, kind: MutationKind) -> String {
    match kind {
        MutationKind::CreateOne => camel_join(&["create", entity]),
        MutationKind::Create => camel_join(&["create", &plural(entity)]),
        MutationKind::UpdateOne => camel_join(&["update", entity]),
        MutationKind::Update => camel_join(&["update", &plural(entity)]),
        MutationKind::BatchUpdate => camel_join(&["batch", "update", entity]),
        MutationKind::DeleteOne => camel_join(&["delete", entity]),
        MutationKind::Delete => camel_join(&["delete", &plural(entity)]),
    }
}

/// Base name for the connection of one relationship, unique per
/// (entity, relationship) pair. e.g. ("User", "todos") -> "UserTodos"
pub fn connection_name(entity: &str, relationship: &str) -> String {
    to_pascal(&camel_join(&[entity, relationship]))
}

/// Output field exposing a freshly created/updated edge on a mutation
/// payload. e.g. ("User", "todos") -> "newUserTodosEdge"
pub fn new_edge_field(from_entity: &str, relationship: &str) -> String {
    camel_join(&["new", from_entity, relationship, "Edge"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_and_pascal() {
        assert_eq!(to_camel("User"), "user");
        assert_eq!(to_camel("TodoAssignee"), "todoAssignee");
        assert_eq!(to_pascal("userTodos"), "UserTodos");
        assert_eq!(camel_join(&["batch", "update", "Todo"]), "batchUpdateTodo");
    }

    #[test]
    fn plurals() {
        assert_eq!(plural("User"), "Users");
        assert_eq!(plural("Category"), "Categories");
        assert_eq!(plural("Boss"), "Bosses");
        assert_eq!(plural("Box"), "Boxes");
        assert_eq!(plural("Day"), "Days");
    }

    #[test]
    fn operation_names() {
        assert_eq!(query_name("User", QueryKind::FindById), "user");
        assert_eq!(query_name("User", QueryKind::FindAll), "users");
        assert_eq!(query_name("TodoAssignee", QueryKind::Count), "todoAssigneeCount");
        assert_eq!(mutation_name("User", MutationKind::CreateOne), "createUser");
        assert_eq!(mutation_name("User", MutationKind::Create), "createUsers");
        assert_eq!(mutation_name("Todo", MutationKind::BatchUpdate), "batchUpdateTodo");
        assert_eq!(mutation_name("Todo", MutationKind::Delete), "deleteTodos");
    }

    #[test]
    fn edge_and_connection_names() {
        assert_eq!(connection_name("User", "todos"), "UserTodos");
        assert_eq!(new_edge_field("User", "todos"), "newUserTodosEdge");
    }
}
