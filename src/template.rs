//! Template rendering — pure string substitution over named placeholders.
//!
//! Templates carry `{name}`, `{company}` and `{main_contact_name}`
//! placeholders; `{{` and `}}` are literal braces so HTML templates can
//! contain CSS blocks. No conditionals, no loops — a malformed template
//! fails once and is never retried.

use crate::error::TemplateError;

/// Substitution set for a single recipient.
#[derive(Debug, Clone, Copy)]
pub struct Substitutions<'a> {
    pub name: &'a str,
    pub company: &'a str,
    pub main_contact_name: &'a str,
}

impl Substitutions<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(self.name),
            "company" => Some(self.company),
            "main_contact_name" => Some(self.main_contact_name),
            _ => None,
        }
    }
}

/// Render a template against one recipient's substitution set.
///
/// A placeholder outside the substitution set is an error, as is a `{`
/// with no matching `}`.
pub fn render(template: &str, subs: &Substitutions<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                if let Some(&(_, '{')) = chars.peek() {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut key = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    key.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnclosedPlaceholder { position });
                }
                match subs.get(&key) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::UnknownPlaceholder { placeholder: key }),
                }
            }
            '}' => {
                // collapse the "}}" escape; a lone "}" passes through
                if let Some(&(_, '}')) = chars.peek() {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
