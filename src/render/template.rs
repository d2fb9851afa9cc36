/// Minimal `{{name}}` placeholder substitution used for the page and the
/// client polling scripts

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("unknown placeholder '{0}'")]
    Unknown(String),
}

/// Replace every `{{name}}` in `template` with the matching value.
///
/// Every placeholder must be known; whitespace inside the braces is ignored.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);

        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + start))?;

        let name = after[..end].trim();
        let value = vars
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| TemplateError::Unknown(name.to_string()))?;
        out.push_str(value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}
