//! Live schema → model conversions used when the *live* database, not the
//! desired bundle, needs to stand in as a lookup source — most notably for
//! reverse-diff policy→table resolution (see [`crate::reverse`]).

use std::collections::HashMap;

use crate::reader::LiveSchema;

/// Since `LiveSchema` and the desired-schema `Database` share one
/// representation, "converting" a live schema into the model used
/// elsewhere is the identity function; this exists so call sites read as
/// the two-stage data flow the design calls for (`Live DB -> Reader ->
/// Live model -> (this) -> Database`) rather than reaching past the
/// reader's output directly.
pub fn to_model(live: &LiveSchema) -> LiveSchema {
    live.clone()
}

/// Build a `policy_name -> table_name` lookup from a live schema, the
/// abstraction the reverse-diff builder uses instead of mutating a diff
/// struct in place.
pub fn policy_table_lookup(live: &LiveSchema) -> HashMap<String, String> {
    live.rls_policies
        .iter()
        .map(|p| (p.name.clone(), p.table.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RLSPolicy;

    #[test]
    fn builds_policy_to_table_map() {
        let mut live = LiveSchema::default();
        live.rls_policies.push(RLSPolicy {
            name: "user_iso".into(),
            table: "users".into(),
            ..Default::default()
        });
        let lookup = policy_table_lookup(&live);
        assert_eq!(lookup.get("user_iso"), Some(&"users".to_string()));
    }
}
