use std::collections::HashMap;

/// A template for summarizer prompts that supports variable substitution.
pub struct PromptTemplate<'a> {
    template: &'a str,
}

impl<'a> PromptTemplate<'a> {
    pub const fn new(template: &'a str) -> Self {
        Self { template }
    }

    /// Render the template by replacing `{{key}}` with the corresponding value.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut output = self.template.to_string();
        for (k, v) in vars {
            let placeholder = format!("{{{{{}}}}}", k);
            output = output.replace(&placeholder, v);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let t = PromptTemplate::new("Summarize {{PREVIOUS_CONTEXT}} against {{CURRENT_CONTEXT}}.");
        let mut vars = HashMap::new();
        vars.insert("PREVIOUS_CONTEXT", "old");
        vars.insert("CURRENT_CONTEXT", "new");
        assert_eq!(t.render(&vars), "Summarize old against new.");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let t = PromptTemplate::new("Keep {{UNKNOWN}} as-is.");
        let vars = HashMap::new();
        assert_eq!(t.render(&vars), "Keep {{UNKNOWN}} as-is.");
    }
}
