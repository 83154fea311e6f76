//! Isolated Rhai execution session.
//!
//! A [`ScriptSession`] owns one Rhai [`Engine`] whose output, debug and
//! host functions are bound to a [`HostUi`] at construction and never
//! re-bound. Each run gets a fresh copy of the base scope, so variables a
//! script defines do not leak into the next run; only the profile (if any)
//! contributes shared variables and functions.
//!
//! Functions available to scripts:
//!
//! | Function | Routed to |
//! |----------|-----------|
//! | `print(x)`, `write_line()`, `write_line(text)` | [`HostUi::write_line`] |
//! | `write(text)` | [`HostUi::write`] |
//! | `debug(x)`, `write_debug(text)` | [`HostUi::write_debug_line`] |
//! | `write_verbose(text)` | [`HostUi::write_verbose_line`] |
//! | `write_warning(text)` | [`HostUi::write_warning_line`] |
//! | `write_error(text)` | [`HostUi::write_error_line`] |
//! | `write_progress(id, activity, status[, percent])`, `write_progress(id, map)`, `complete_progress(id)` | [`HostUi::write_progress`] |
//! | `read_line()`, `prompt(caption)`, `prompt_for_choice(caption, choices)`, `prompt_for_credential(caption, user)` | interactive, always fail |
//! | `exit()`, `exit(code)` | [`HostUi::write_error_line`], then ends the run |
//! | `location()` | directory of the running script |
//!
//! Interactive calls and `exit` end the run with an error scripts cannot
//! `catch`. A non-zero exit code fails the run; `exit(0)` ends it cleanly.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cronscript_core::progress::{ProgressKind, ProgressRecord, UNKNOWN};
use rhai::module_resolvers::FileModuleResolver;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, Position, Scope, AST, INT};
use tokio_util::sync::CancellationToken;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::ui::HostUi;

/// How many Rhai operations run between two cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 256;

/// Why a host function stopped the running script.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Halt {
    Exit(INT),
    Fatal(String),
}

type HaltSlot = Arc<Mutex<Option<Halt>>>;

/// One Rhai engine bound to a host callback sink.
pub struct ScriptSession {
    engine: Engine,
    ui: Arc<dyn HostUi>,
    base_scope: Scope<'static>,
    /// Functions defined by the profile script, merged into every run.
    profile_functions: Option<AST>,
    location: Arc<Mutex<PathBuf>>,
    abort: Arc<Mutex<Option<CancellationToken>>>,
    halt: HaltSlot,
}

impl ScriptSession {
    /// Create the engine, register the host surface and evaluate the profile.
    pub fn open(ui: Arc<dyn HostUi>, config: &HostConfig) -> Result<Self, HostError> {
        let location = Arc::new(Mutex::new(
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        ));
        let abort = Arc::new(Mutex::new(None));
        let halt: HaltSlot = Arc::new(Mutex::new(None));

        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);

        register_output(&mut engine, &ui);
        register_progress(&mut engine, &ui);
        register_interactive(&mut engine, &ui, &halt);
        register_exit(&mut engine, &ui, &halt);
        register_location(&mut engine, &location);
        install_abort_hook(&mut engine, &abort);

        let mut session = Self {
            engine,
            ui,
            base_scope: Scope::new(),
            profile_functions: None,
            location,
            abort,
            halt,
        };

        if let Some(profile) = &config.profile {
            session.load_profile(profile)?;
        }

        Ok(session)
    }

    /// Directory scripts resolve `import` paths and `location()` against.
    pub fn location(&self) -> PathBuf {
        lock(&self.location).clone()
    }

    pub fn set_location(&mut self, dir: &Path) {
        *lock(&self.location) = dir.to_path_buf();
        self.engine
            .set_module_resolver(FileModuleResolver::new_with_path(dir));
    }

    /// Compile and run `script`, blocking until it returns.
    ///
    /// Parse and runtime errors are written to the host's error line before
    /// being returned as [`HostError::ScriptFailed`].
    pub fn invoke(
        &mut self,
        script: &str,
        script_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), HostError> {
        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }

        let ast = self
            .engine
            .compile(script)
            .map_err(|e| self.report(format!("{}: parse error: {e}", script_path.display())))?;
        let ast = match &self.profile_functions {
            Some(functions) => functions.merge(&ast),
            None => ast,
        };

        let mut scope = self.base_scope.clone();
        scope.push_constant("SCRIPT_PATH", script_path.display().to_string());
        scope.push_constant("SCRIPT_DIR", self.location().display().to_string());

        *lock(&self.halt) = None;
        *lock(&self.abort) = Some(cancel.clone());
        let result = self.engine.run_ast_with_scope(&mut scope, &ast);
        *lock(&self.abort) = None;

        let halt = lock(&self.halt).take();
        match halt {
            // The exit request was already written to the error line.
            Some(Halt::Exit(0)) => return Ok(()),
            Some(Halt::Exit(code)) => {
                return Err(HostError::ScriptFailed(format!(
                    "{}: exit requested with code {code}",
                    script_path.display()
                )));
            }
            Some(Halt::Fatal(message)) => {
                return Err(self.report(format!("{}: {message}", script_path.display())));
            }
            None => {}
        }

        match result {
            Ok(()) => Ok(()),
            Err(err) if matches!(*err, EvalAltResult::ErrorTerminated(..)) && cancel.is_cancelled() => {
                Err(HostError::Cancelled)
            }
            Err(err) => Err(self.report(format!("{}: {err}", script_path.display()))),
        }
    }

    fn load_profile(&mut self, profile: &Path) -> Result<(), HostError> {
        let source = std::fs::read_to_string(profile).map_err(|e| {
            HostError::SessionInitFailed(format!(
                "cannot read profile {}: {e}",
                profile.display()
            ))
        })?;

        if let Some(dir) = profile.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.set_location(dir);
        }

        let ast = self.engine.compile(&source).map_err(|e| {
            HostError::SessionInitFailed(format!("profile {}: {e}", profile.display()))
        })?;
        self.engine
            .run_ast_with_scope(&mut self.base_scope, &ast)
            .map_err(|e| {
                HostError::SessionInitFailed(format!("profile {}: {e}", profile.display()))
            })?;

        self.profile_functions = Some(ast.clone_functions_only());
        Ok(())
    }

    fn report(&self, message: String) -> HostError {
        self.ui.write_error_line(&message);
        HostError::ScriptFailed(message)
    }
}

// ---------------------------------------------------------------------------
// Host surface registration
// ---------------------------------------------------------------------------

fn register_output(engine: &mut Engine, ui: &Arc<dyn HostUi>) {
    let sink = ui.clone();
    engine.on_print(move |text| sink.write_line(text));

    let sink = ui.clone();
    engine.on_debug(move |text, _source, pos| match pos.line() {
        Some(line) => sink.write_debug_line(&format!("line {line}: {text}")),
        None => sink.write_debug_line(text),
    });

    let sink = ui.clone();
    engine.register_fn("write", move |text: ImmutableString| sink.write(&text));

    let sink = ui.clone();
    engine.register_fn("write_line", move || sink.write_line(""));

    let sink = ui.clone();
    engine.register_fn("write_line", move |text: ImmutableString| {
        sink.write_line(&text)
    });

    let sink = ui.clone();
    engine.register_fn("write_debug", move |text: ImmutableString| {
        sink.write_debug_line(&text)
    });

    let sink = ui.clone();
    engine.register_fn("write_verbose", move |text: ImmutableString| {
        sink.write_verbose_line(&text)
    });

    let sink = ui.clone();
    engine.register_fn("write_warning", move |text: ImmutableString| {
        sink.write_warning_line(&text)
    });

    let sink = ui.clone();
    engine.register_fn("write_error", move |text: ImmutableString| {
        sink.write_error_line(&text)
    });
}

fn register_progress(engine: &mut Engine, ui: &Arc<dyn HostUi>) {
    let sink = ui.clone();
    engine.register_fn(
        "write_progress",
        move |id: INT, activity: ImmutableString, status: ImmutableString| {
            sink.write_progress(id, &ProgressRecord::new(activity.as_str(), status.as_str()));
        },
    );

    let sink = ui.clone();
    engine.register_fn(
        "write_progress",
        move |id: INT, activity: ImmutableString, status: ImmutableString, percent: INT| {
            let record = ProgressRecord::new(activity.as_str(), status.as_str())
                .with_percent(to_i32(percent));
            sink.write_progress(id, &record);
        },
    );

    let sink = ui.clone();
    engine.register_fn("write_progress", move |id: INT, fields: Map| {
        sink.write_progress(id, &record_from_map(&fields));
    });

    let sink = ui.clone();
    engine.register_fn("complete_progress", move |id: INT| {
        sink.write_progress(id, &ProgressRecord::completed());
    });
}

fn register_interactive(engine: &mut Engine, ui: &Arc<dyn HostUi>, halt: &HaltSlot) {
    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn("read_line", move || -> Result<String, Box<EvalAltResult>> {
        sink.read_line().map_err(|e| fatal(&slot, e))
    });

    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn(
        "prompt",
        move |caption: ImmutableString| -> Result<String, Box<EvalAltResult>> {
            sink.prompt(&caption, "").map_err(|e| fatal(&slot, e))
        },
    );

    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn(
        "prompt_for_choice",
        move |caption: ImmutableString, choices: Array| -> Result<INT, Box<EvalAltResult>> {
            let choices: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
            sink.prompt_for_choice(&caption, &choices, 0)
                .map(|index| INT::try_from(index).unwrap_or(INT::MAX))
                .map_err(|e| fatal(&slot, e))
        },
    );

    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn(
        "prompt_for_credential",
        move |caption: ImmutableString, user: ImmutableString| -> Result<Map, Box<EvalAltResult>> {
            let credential = sink
                .prompt_for_credential(&caption, &user)
                .map_err(|e| fatal(&slot, e))?;
            let mut map = Map::new();
            map.insert("user_name".into(), credential.user_name.into());
            map.insert("password".into(), credential.password.into());
            Ok(map)
        },
    );
}

/// `exit()` / `exit(code)`: log the request and stop the script.
fn register_exit(engine: &mut Engine, ui: &Arc<dyn HostUi>, halt: &HaltSlot) {
    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn("exit", move || -> Result<(), Box<EvalAltResult>> {
        Err(request_exit(sink.as_ref(), &slot, 0))
    });

    let (sink, slot) = (ui.clone(), halt.clone());
    engine.register_fn("exit", move |code: INT| -> Result<(), Box<EvalAltResult>> {
        Err(request_exit(sink.as_ref(), &slot, code))
    });
}

fn register_location(engine: &mut Engine, location: &Arc<Mutex<PathBuf>>) {
    let current = location.clone();
    engine.register_fn("location", move || -> String {
        lock(&current).display().to_string()
    });
}

/// Terminate the running script once its cancellation token fires.
fn install_abort_hook(engine: &mut Engine, abort: &Arc<Mutex<Option<CancellationToken>>>) {
    let slot = abort.clone();
    engine.on_progress(move |operations| {
        if operations % CANCEL_CHECK_INTERVAL != 0 {
            return None;
        }
        let cancelled = lock(&slot)
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        cancelled.then(|| Dynamic::from("cancelled".to_string()))
    });
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a progress record from a script map.
///
/// Recognised keys: `activity`, `operation`, `status`, `percent`,
/// `seconds_remaining`, `completed`. Missing keys keep their defaults.
fn record_from_map(fields: &Map) -> ProgressRecord {
    let text = |key: &str| {
        fields
            .get(key)
            .filter(|v| !v.is_unit())
            .map(|v| v.to_string())
            .unwrap_or_default()
    };
    let number = |key: &str| {
        fields
            .get(key)
            .and_then(|v| v.as_int().ok())
            .map(to_i32)
            .unwrap_or(UNKNOWN)
    };
    let completed = fields
        .get("completed")
        .and_then(|v| v.as_bool().ok())
        .unwrap_or(false);

    let record = ProgressRecord::new(text("activity"), text("status"))
        .with_operation(text("operation"))
        .with_percent(number("percent"))
        .with_seconds_remaining(number("seconds_remaining"));

    ProgressRecord {
        kind: if completed {
            ProgressKind::Completed
        } else {
            ProgressKind::InProgress
        },
        ..record
    }
}

fn to_i32(value: INT) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Record `err` as the reason the run stops and terminate the script.
fn fatal(halt: &HaltSlot, err: HostError) -> Box<EvalAltResult> {
    let message = err.to_string();
    *lock(halt) = Some(Halt::Fatal(message.clone()));
    terminate(message)
}

fn request_exit(ui: &dyn HostUi, halt: &HaltSlot, code: INT) -> Box<EvalAltResult> {
    ui.write_error_line(&format!("Exit requested: {code}"));
    *lock(halt) = Some(Halt::Exit(code));
    terminate(format!("exit({code})"))
}

/// `ErrorTerminated` is not catchable, so `try`/`catch` cannot swallow it.
fn terminate(reason: String) -> Box<EvalAltResult> {
    EvalAltResult::ErrorTerminated(reason.into(), Position::NONE).into()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
