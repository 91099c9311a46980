//! Semantic binding
//!
//! Turns syntactic tokens into typed [`QueryNode`]s against an [`EdmModel`].
//! Hard failures come back as [`BindingError`]; names that do not resolve
//! are carried as placeholders and surface through `errors()` on any node or
//! clause that contains them.

pub mod binder;
pub mod clauses;
pub mod context;
pub mod error;
pub mod functions;
pub mod literals;
pub mod nodes;
pub mod options;

pub use binder::MetadataBinder;
pub use clauses::{
    AggregateClause, AggregateExpression, ApplyClause, ExpandedItem, FilterClause, GroupByClause,
    OrderByClause, OrderByClauseItem, SearchClause, SelectExpandClause, SelectItem,
    TransformationClause, TransformationNode,
};
pub use context::{BindingContext, RangeVariable};
pub use error::{BindingError, BindingResult};
pub use functions::built_in_functions;
pub use nodes::QueryNode;

use crate::config::runtime::BindingPreferences;
use crate::grammar::ast::nodes::QueryToken;
use crate::logging::codes;
use crate::model::EdmModel;
use crate::{log_error, log_success};

/// Bind a single expression against the entity set's element type
pub fn bind_expression(
    model: &dyn EdmModel,
    entity_set: &str,
    token: &QueryToken,
    preferences: BindingPreferences,
) -> BindingResult<QueryNode> {
    let context = BindingContext::for_entity_set(model, entity_set);
    let mut binder = MetadataBinder::new(model, context).with_preferences(preferences);

    match binder.bind(token) {
        Ok(node) => {
            log_success!(codes::success::BINDING_COMPLETE, "Expression bound",
                "entity_set" => entity_set,
                "node" => node.kind_name(),
                "diagnostics" => node.errors().len()
            );
            Ok(node)
        }
        Err(error) => {
            log_error!(error.error_code(), &error.to_string(), span = error.span(),
                "entity_set" => entity_set
            );
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical;
    use crate::model::fixtures::sales_model;
    use crate::syntax::{self, GrammarEntry};

    #[test]
    fn test_bind_expression_against_unknown_set() {
        let model = sales_model();
        let tokens = lexical::tokenize("Name eq 'x'").unwrap();
        let token = syntax::parse(tokens, GrammarEntry::Expression).unwrap();

        let node = bind_expression(&model, "Customers", &token, BindingPreferences::default()).unwrap();
        assert!(!node.has_errors());

        let node = bind_expression(&model, "Nowhere", &token, BindingPreferences::default()).unwrap();
        assert_eq!(node.errors().len(), 1);
        assert_eq!(node.errors()[0].code, codes::binding::UNRESOLVED_ENTITY_SET);
    }
}
