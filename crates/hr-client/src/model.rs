use serde::Deserialize;

/// One employee's current department placement, as reported by the HR
/// source (spec §6: "the employee→department-path mapping").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Employee {
    /// Employee identifier; matches `User::id` / the gateway's
    /// `employee_number`.
    pub employee_number: String,
    /// Slash-separated department path, e.g. `/acme/eng/backend`.
    pub department_path: String,
}

/// A department node, identified by its full path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Department {
    /// The department's unique key (spec §4.6 `set_department_whitelist`'s
    /// `dept_key`).
    pub key: String,
    /// Slash-separated department path.
    pub path: String,
}

impl Department {
    /// Returns `true` if `employee_path` is this department or a
    /// descendant of it (spec §4.6: "every employee in the department
    /// subtree").
    #[must_use]
    pub fn contains_path(&self, employee_path: &str) -> bool {
        employee_path == self.path || employee_path.starts_with(&format!("{}/", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_containment() {
        let dept = Department { key: "eng".into(), path: "/acme/eng".into() };
        assert!(dept.contains_path("/acme/eng"));
        assert!(dept.contains_path("/acme/eng/backend"));
        assert!(!dept.contains_path("/acme/sales"));
        assert!(!dept.contains_path("/acme/engineering"));
    }
}
