use qm_hr_client::Department;

/// Every department that contains `employee_path`, deepest first (spec
/// §4.6: "walk department path from deepest to shallowest").
#[must_use]
pub fn chain_for<'a>(departments: &'a [Department], employee_path: &str) -> Vec<&'a Department> {
    let mut matches: Vec<&Department> =
        departments.iter().filter(|d| d.contains_path(employee_path)).collect();
    matches.sort_by_key(|d| std::cmp::Reverse(d.path.len()));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(key: &str, path: &str) -> Department {
        Department { key: key.to_owned(), path: path.to_owned() }
    }

    #[test]
    fn orders_deepest_first() {
        let departments =
            vec![dept("acme", "/acme"), dept("eng", "/acme/eng"), dept("backend", "/acme/eng/backend")];
        let chain = chain_for(&departments, "/acme/eng/backend");
        let keys: Vec<_> = chain.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["backend", "eng", "acme"]);
    }

    #[test]
    fn excludes_unrelated_departments() {
        let departments = vec![dept("eng", "/acme/eng"), dept("sales", "/acme/sales")];
        let chain = chain_for(&departments, "/acme/eng/backend");
        let keys: Vec<_> = chain.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["eng"]);
    }
}
