//! 规则编辑对话框
//!
//! 表单构建失败（配置错误）时，非生产环境输出错误信息，生产环境静默；
//! 页脚按钮始终输出。

use crate::{config::AppConfig, error::AppError, models::item::Rule};
use minijinja::{context, default_auto_escape_callback, Environment};
use serde::Serialize;

const FORM_TEMPLATE: &str = "rule/ajax_edit_form.html";
const FOOTER_TEMPLATE: &str = "rule/ajax_edit_footer.html";

/// 表单 id（模型的表单名）
const FORM_ID: &str = "Rule";

#[derive(Serialize)]
struct TextField<'a> {
    name: &'static str,
    label: &'static str,
    value: &'a str,
    maxlength: usize,
}

pub struct RuleEditView {
    env: Environment<'static>,
    validation_route: String,
    production: bool,
}

impl RuleEditView {
    pub fn new(validation_route: impl Into<String>, production: bool) -> Result<Self, AppError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.add_template(FORM_TEMPLATE, include_str!("templates/rule/ajax_edit_form.html"))
            .map_err(|e| AppError::Config(format!("Invalid template {}: {}", FORM_TEMPLATE, e)))?;
        env.add_template(FOOTER_TEMPLATE, include_str!("templates/rule/ajax_edit_footer.html"))
            .map_err(|e| AppError::Config(format!("Invalid template {}: {}", FOOTER_TEMPLATE, e)))?;

        Ok(Self {
            env,
            validation_route: validation_route.into(),
            production,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(config.app.rule_validation_route.clone(), config.is_production())
    }

    /// 校验/保存地址，以主键为参数
    pub fn validation_url(&self, rule: &Rule) -> Result<String, AppError> {
        let route = self.validation_route.trim();
        if route.is_empty() {
            return Err(AppError::Config(
                "rule validation route is not configured".to_string(),
            ));
        }
        let id: String = url::form_urlencoded::byte_serialize(rule.primary_key().as_bytes()).collect();
        let separator = if route.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}id={}", route, separator, id))
    }

    pub fn render(&self, rule: &Rule) -> Result<String, AppError> {
        let (body, error) = match self.render_form(rule) {
            Ok(html) => (Some(html), None),
            Err(AppError::Config(message)) => {
                tracing::warn!(rule = %rule.name, error = %message, "Rule edit form unavailable");
                let shown = if self.production { None } else { Some(message) };
                (None, shown)
            }
            Err(e) => return Err(e),
        };

        let footer = self
            .env
            .get_template(FOOTER_TEMPLATE)
            .and_then(|tmpl| {
                tmpl.render(context! {
                    error => error,
                    form_open => body.is_some(),
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to render rule footer: {}", e)))?;

        Ok(format!("{}{}", body.unwrap_or_default(), footer))
    }

    fn render_form(&self, rule: &Rule) -> Result<String, AppError> {
        let validation_url = self.validation_url(rule)?;
        let fields = [
            TextField {
                name: "name",
                label: "Name",
                value: &rule.name,
                maxlength: 64,
            },
            TextField {
                name: "class_name",
                label: "Class Name",
                value: &rule.class_name,
                maxlength: 255,
            },
        ];

        let tmpl = self
            .env
            .get_template(FORM_TEMPLATE)
            .map_err(|e| AppError::Config(e.to_string()))?;
        tmpl.render(context! {
            form_id => FORM_ID,
            title => "Edit rule",
            validation_url => validation_url,
            fields => fields,
        })
        .map_err(|e| AppError::Internal(format!("Failed to render rule form: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> Rule {
        Rule {
            name: "isAuthor".to_string(),
            class_name: "app\\rbac\\AuthorRule".to_string(),
        }
    }

    #[test]
    fn test_validation_url_keyed_by_primary_key() {
        let view = RuleEditView::new("/srbac/rule/ajax-edit", false).unwrap();
        let rule = Rule {
            name: "is owner".to_string(),
            class_name: String::new(),
        };
        assert_eq!(
            view.validation_url(&rule).unwrap(),
            "/srbac/rule/ajax-edit?id=is+owner"
        );
    }

    #[test]
    fn test_render_contains_fields() {
        let view = RuleEditView::new("/srbac/rule/ajax-edit", false).unwrap();
        let html = view.render(&rule()).unwrap();

        assert!(html.contains("<form id=\"Rule\""));
        assert!(html.contains("name=\"Rule[name]\""));
        assert!(html.contains("name=\"Rule[class_name]\""));
        assert!(html.contains("value=\"isAuthor\""));
        assert!(html.contains("Edit rule"));
        assert!(html.contains("</form>"));
    }

    #[test]
    fn test_missing_route_shows_error_outside_production() {
        let view = RuleEditView::new("", false).unwrap();
        let html = view.render(&rule()).unwrap();

        assert!(html.contains("rule validation route is not configured"));
        assert!(!html.contains("<form"));
        assert!(html.contains("modal-footer"));
    }

    #[test]
    fn test_missing_route_hidden_in_production() {
        let view = RuleEditView::new("", true).unwrap();
        let html = view.render(&rule()).unwrap();

        assert!(!html.contains("not configured"));
        assert!(html.contains("modal-footer"));
    }
}
