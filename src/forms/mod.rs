//! 表单模块

pub mod user_form;

pub use user_form::{UserForm, UserFormInput, UserFormView};
