//! Variable interpolation for strings
//!
//! Alias arguments and configured working directories may reference
//! variables using the `${var}` syntax.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("interpolation regex is valid"));

/// Maximum depth of variables expanding into other variables
const MAX_DEPTH: usize = 32;

/// Interpolate variables in a string
///
/// Lookup order is `vars` first, then the process environment. Unknown
/// variables are left untouched, and so is a variable referenced from its
/// own expansion.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    expand(s, vars, &mut Vec::new())
}

fn expand(
    s: &str,
    vars: &HashMap<String, String>,
    stack: &mut Vec<String>,
) -> InterpolationResult<String> {
    if stack.len() > MAX_DEPTH {
        return Err(InterpolationError::RecursiveInterpolation);
    }

    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for caps in VAR_RE.captures_iter(s) {
        let (whole, var_name) = match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(name)) => (whole, name.as_str()),
            _ => continue,
        };
        result.push_str(&s[last..whole.start()]);
        last = whole.end();

        let value = if stack.iter().any(|active| active == var_name) {
            None
        } else {
            vars.get(var_name)
                .cloned()
                .or_else(|| env::var(var_name).ok())
        };

        match value {
            Some(value) => {
                stack.push(var_name.to_string());
                let expanded = expand(&value, vars, stack);
                stack.pop();
                result.push_str(&expanded?);
            }
            None => result.push_str(whole.as_str()),
        }
    }

    result.push_str(&s[last..]);
    Ok(result)
}

/// Interpolate with strict mode - errors on undefined variables
pub fn interpolate_strict(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = VAR_RE.captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}

/// Interpolate a list of strings
pub fn interpolate_list(
    list: &[String],
    vars: &HashMap<String, String>,
) -> InterpolationResult<Vec<String>> {
    list.iter().map(|s| interpolate(s, vars)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_interpolation() {
        let result = interpolate("git checkout ${branch}", &vars(&[("branch", "main")])).unwrap();
        assert_eq!(result, "git checkout main");
    }

    #[test]
    fn test_environment_variable() {
        env::set_var("XH_INTERP_TEST", "from-env");
        let result = interpolate("${XH_INTERP_TEST}", &HashMap::new()).unwrap();
        assert_eq!(result, "from-env");
        env::remove_var("XH_INTERP_TEST");
    }

    #[test]
    fn test_vars_shadow_environment() {
        env::set_var("XH_INTERP_SHADOW", "env");
        let result = interpolate("${XH_INTERP_SHADOW}", &vars(&[("XH_INTERP_SHADOW", "local")]))
            .unwrap();
        assert_eq!(result, "local");
        env::remove_var("XH_INTERP_SHADOW");
    }

    #[test]
    fn test_undefined_variable_lenient() {
        let result = interpolate("--out=${nope}", &HashMap::new()).unwrap();
        assert_eq!(result, "--out=${nope}");
    }

    #[test]
    fn test_undefined_variable_strict() {
        let result = interpolate_strict("--out=${nope}", &HashMap::new());
        assert!(matches!(
            result,
            Err(InterpolationError::UndefinedVariable(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_nested_interpolation() {
        let v = vars(&[("inner", "value"), ("outer", "${inner}")]);
        assert_eq!(interpolate("${outer}", &v).unwrap(), "value");
    }

    #[test]
    fn test_self_reference_terminates() {
        let v = vars(&[("loop", "${loop}")]);
        assert_eq!(interpolate("${loop}", &v).unwrap(), "${loop}");
    }

    #[test]
    fn test_repeated_variable() {
        let v = vars(&[("x", "v")]);
        assert_eq!(interpolate("${x}:${x}", &v).unwrap(), "v:v");
        assert_eq!(interpolate("--from=${x}/a:${x}/b", &v).unwrap(), "--from=v/a:v/b");
    }

    #[test]
    fn test_variable_reused_inside_another() {
        let v = vars(&[("x", "v"), ("y", "${x}-${x}")]);
        assert_eq!(interpolate("${x} ${y}", &v).unwrap(), "v v-v");
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let v = vars(&[("a", "<${b}>"), ("b", "[${a}]")]);
        assert_eq!(interpolate("${a}", &v).unwrap(), "<[${a}]>");
    }

    #[test]
    fn test_deep_chain_is_rejected() {
        let mut v = HashMap::new();
        for i in 0..40 {
            v.insert(format!("v{}", i), format!("${{v{}}}", i + 1));
        }
        assert!(matches!(
            interpolate("${v0}", &v),
            Err(InterpolationError::RecursiveInterpolation)
        ));
    }

    #[test]
    fn test_interpolate_list() {
        let v = vars(&[("name", "test")]);
        let list = vec!["file-${name}.txt".to_string(), "static".to_string()];
        assert_eq!(
            interpolate_list(&list, &v).unwrap(),
            vec!["file-test.txt", "static"]
        );
    }
}
