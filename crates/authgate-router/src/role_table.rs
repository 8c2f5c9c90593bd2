//! Path prefix -> required roles

use std::collections::{BTreeSet, HashMap};

use authgate_shared::utils::path_has_prefix;

#[derive(Debug, Clone, Default)]
pub struct RouteRoleTable {
    entries: Vec<(String, BTreeSet<String>)>,
    sufficient: BTreeSet<String>,
}

impl RouteRoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(table: &HashMap<String, Vec<String>>, sufficient: &[String]) -> Self {
        let mut built = Self::new();
        for (prefix, roles) in table {
            built.register(prefix, roles.iter().map(String::as_str));
        }
        for role in sufficient {
            built.add_sufficient_role(role);
        }
        built
    }

    /// Registering the same prefix again replaces its roles.
    pub fn register<'a>(&mut self, prefix: &str, roles: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let prefix = normalize(prefix);
        let roles: BTreeSet<String> = roles.into_iter().map(str::to_string).collect();
        match self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = roles,
            None => self.entries.push((prefix, roles)),
        }
        self
    }

    /// A role holding it passes every requirement.
    pub fn add_sufficient_role(&mut self, role: &str) -> &mut Self {
        self.sufficient.insert(role.to_string());
        self
    }

    /// Roles of the longest registered prefix covering `path`, `None` when
    /// the path is unrestricted.
    pub fn required_roles(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.entries
            .iter()
            .filter(|(prefix, _)| path_has_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, roles)| roles)
    }

    /// Any one required role is enough.
    pub fn is_satisfied(&self, path: &str, user_roles: &BTreeSet<String>) -> bool {
        match self.required_roles(path) {
            None => true,
            Some(required) => {
                required.iter().any(|r| user_roles.contains(r))
                    || self.sufficient.iter().any(|r| user_roles.contains(r))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
