//! 视图渲染

pub mod rule_edit;

pub use rule_edit::RuleEditView;
