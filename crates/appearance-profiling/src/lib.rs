pub use puffin;

/// Turns scope collection on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    puffin::set_scopes_on(enabled);
}

pub fn is_enabled() -> bool {
    puffin::are_scopes_on()
}

/// Closes the current profiling frame, import tools call this once per imported model.
pub fn finish_frame() {
    if puffin::are_scopes_on() {
        puffin::GlobalProfiler::lock().new_frame();
    }
}

#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        $crate::puffin::profile_scope!($name);
    };
    ($name:expr, $data:expr) => {
        $crate::puffin::profile_scope!($name, $data);
    };
}

#[macro_export]
macro_rules! profile_function {
    () => {
        $crate::puffin::profile_function!();
    };
    ($data:expr) => {
        $crate::puffin::profile_function!($data);
    };
}
