mod convert;
mod module;
mod object;

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{error, warn};
use mlua::{Function, Lua, LuaOptions, RegistryKey, Result as LuaResult, StdLib};

use crate::bridge::{Bridge, BridgeOptions};
use crate::engine::{Facade, SharedEngine};
use crate::error::bridge_error;
use crate::listeners::ListenerRegistry;
use crate::registry::{TypeRegistry, Wrapper};
use crate::slots::SlotTable;

use object::ScriptObject;

/// One registered update handler: the wrapper it was registered through
/// and the Lua function, held in the Lua registry.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    wrapper: Wrapper,
    function: Rc<RegistryKey>,
}

pub(crate) struct HostState {
    bridge: Bridge,
    listeners: RefCell<ListenerRegistry<ListenerEntry>>,
    dispatching: Cell<bool>,
}

/// Lua runtime with the `ggb` module installed over one construction.
pub struct ScriptHost {
    lua: Lua,
    state: Rc<HostState>,
}

impl ScriptHost {
    pub fn new(engine: SharedEngine, options: BridgeOptions) -> Result<Self> {
        ScriptHost::with_registry(engine, TypeRegistry::standard(), options)
    }

    /// Host whose type dispatch uses `registry` instead of the standard one.
    pub fn with_registry(
        engine: SharedEngine,
        registry: TypeRegistry,
        options: BridgeOptions,
    ) -> Result<Self> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
            .context("initialising Lua runtime with standard libraries")?;
        let bridge = Bridge::new(Facade::new(engine), registry, SlotTable::standard(), options);
        let state = Rc::new(HostState {
            bridge,
            listeners: RefCell::new(ListenerRegistry::new()),
            dispatching: Cell::new(false),
        });
        module::install_ggb_module(&lua, state.clone()).context("installing ggb module")?;
        Ok(ScriptHost { lua, state })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn bridge(&self) -> &Bridge {
        &self.state.bridge
    }

    /// Runs a chunk, then any updates it left pending. A failing script
    /// releases every handler list; objects it created stay in the
    /// construction.
    pub fn run(&self, source: &str, name: &str) -> LuaResult<()> {
        self.state.bridge.record_event(format!("script.start {name}"));
        let result = self
            .lua
            .load(source)
            .set_name(name)
            .exec()
            .and_then(|()| dispatch_updates(&self.lua, &self.state).map(|_| ()));
        match &result {
            Ok(()) => self.state.bridge.record_event(format!("script.end {name}")),
            Err(err) => {
                match bridge_error(err) {
                    Some(cause) if !cause.is_user_error() => {
                        error!("script {name} hit a bridge fault: {err}")
                    }
                    _ => warn!("script {name} failed: {err}"),
                }
                self.state.bridge.record_event(format!("script.error {name}"));
                self.release_listeners();
            }
        }
        result
    }

    pub fn run_file(&self, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading Lua script {}", path.display()))?;
        let name = path.display().to_string();
        self.run(&source, &name)
            .with_context(|| format!("running Lua script {name}"))
    }

    /// Moves a free point as a user drag would, then fires handlers.
    pub fn move_point(&self, label: &str, x: f64, y: f64) -> LuaResult<usize> {
        self.state.bridge.facade().object(label).set_coords(x, y)?;
        self.state
            .bridge
            .record_event(format!("drag {label} ({x}, {y})"));
        dispatch_updates(&self.lua, &self.state)
    }

    /// Sets a free number as a slider would, then fires handlers.
    pub fn set_value(&self, label: &str, value: f64) -> LuaResult<usize> {
        self.state.bridge.facade().object(label).set_numeric_value(value)?;
        self.state
            .bridge
            .record_event(format!("slider {label} {value}"));
        dispatch_updates(&self.lua, &self.state)
    }

    pub fn dispatch_updates(&self) -> LuaResult<usize> {
        dispatch_updates(&self.lua, &self.state)
    }

    /// Drops every handler, as when the host aborts the running script.
    pub fn abort(&self) -> usize {
        self.release_listeners()
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().total()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.bridge.events()
    }

    fn release_listeners(&self) -> usize {
        let released = self.state.listeners.borrow_mut().release_all();
        let count = released.len();
        drop(released);
        self.lua.expire_registry_values();
        self.state
            .bridge
            .record_event(format!("listeners.released {count}"));
        count
    }
}

/// Drops handler lists of objects that are no longer live.
pub(crate) fn prune_listeners(lua: &Lua, state: &HostState) {
    let facade = state.bridge.facade();
    let dropped = state
        .listeners
        .borrow_mut()
        .retain_labels(|label| facade.is_live(label));
    if dropped > 0 {
        lua.expire_registry_values();
    }
}

/// Drains engine change notifications and fires handlers until the engine
/// is quiet or `max_update_passes` is reached.
///
/// Nested calls (from handlers that mutate the construction) return at once;
/// the outer loop picks up whatever they queued.
pub(crate) fn dispatch_updates(lua: &Lua, state: &Rc<HostState>) -> LuaResult<usize> {
    if state.dispatching.replace(true) {
        return Ok(0);
    }
    let result = drive_update_passes(lua, state);
    state.dispatching.set(false);
    result
}

fn drive_update_passes(lua: &Lua, state: &Rc<HostState>) -> LuaResult<usize> {
    let bridge = &state.bridge;
    let facade = bridge.facade();
    let max_passes = bridge.options().max_update_passes;
    let mut fired = 0;

    for _ in 0..max_passes {
        let updates = facade.drain_updates();
        if updates.is_empty() {
            return Ok(fired);
        }
        for label in updates {
            bridge.record_event(format!("update {label}"));
            let count = ListenerRegistry::fire(
                &state.listeners,
                &label,
                || facade.is_live(&label),
                |entry: ListenerEntry| {
                    let function: Function = lua.registry_value(&entry.function)?;
                    function.call::<_, ()>(ScriptObject::new(entry.wrapper, state.clone()))
                },
            )?;
            if count > 0 {
                bridge.record_event(format!("listener.fire {label} ({count})"));
                fired += count;
            }
        }
    }

    let dropped = facade.drain_updates();
    if !dropped.is_empty() {
        warn!(
            "update dispatch stopped after {max_passes} passes; dropping updates for {}",
            dropped.join(",")
        );
        bridge.record_event(format!("update.cutoff {}", dropped.join(",")));
    }
    Ok(fired)
}
