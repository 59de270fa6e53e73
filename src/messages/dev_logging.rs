// IR LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_ir")]
macro_rules! ir_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_ir"))]
macro_rules! ir_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// FUSION PASS LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_fusion")]
macro_rules! fusion_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_fusion"))]
macro_rules! fusion_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}
