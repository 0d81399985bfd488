use std::env;

/// Restores the saved environment variables when dropped, even if the test
/// body panics.
struct EnvGuard(Vec<(String, Option<String>)>);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.0.drain(..) {
            match previous {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
    }
}

/// Runs `f` with `vars` set. Tests using this must be `#[serial]`.
pub fn with_env<F>(vars: Vec<(&str, &str)>, f: F)
where
    F: FnOnce(),
{
    let _guard = EnvGuard(
        vars.iter()
            .map(|(key, _)| (key.to_string(), env::var(key).ok()))
            .collect(),
    );

    for (key, value) in &vars {
        env::set_var(key, value);
    }

    f();
}
