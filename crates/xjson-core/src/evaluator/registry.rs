//! Process-wide registry of custom scripting extensions. Registration is a
//! side effect with last-write-wins semantics; there is no unregistration.
//! Callers must register extensions before concurrent evaluations begin —
//! the registry is not otherwise synchronized against evaluation itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use super::grammar::Arg;

pub type CustomFn = Arc<dyn Fn(&[Arg]) -> Result<String, String> + Send + Sync>;

fn registry() -> &'static Mutex<HashMap<String, CustomFn>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, CustomFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn register(name: impl Into<String>, f: CustomFn) {
    registry()
        .lock()
        .expect("custom extension registry poisoned")
        .insert(name.into(), f);
}

pub fn call(name: &str, args: &[Arg]) -> Option<Result<String, String>> {
    let guard = registry().lock().expect("custom extension registry poisoned");
    guard.get(name).map(|f| f(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_function_is_consulted_before_builtins() {
        register(
            "shout",
            Arc::new(|args: &[Arg]| {
                let Some(Arg::Str(s)) = args.first() else {
                    return Err("expected a string argument".to_string());
                };
                Ok(s.to_uppercase())
            }),
        );
        let result = call("shout", &[Arg::Str("hi".to_string())]);
        assert_eq!(result, Some(Ok("HI".to_string())));
    }

    #[test]
    fn unregistered_name_returns_none() {
        assert_eq!(call("definitely_not_registered_xyz", &[]), None);
    }

    #[test]
    fn last_write_wins() {
        register("dup", Arc::new(|_| Ok("first".to_string())));
        register("dup", Arc::new(|_| Ok("second".to_string())));
        assert_eq!(call("dup", &[]), Some(Ok("second".to_string())));
    }
}
