// Logging shims: forward to the `log` crate when the `log` feature is on,
// otherwise swallow the arguments.

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)+) => {
        ::log::trace!($($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($arg:tt)+) => {
        ::log::debug!($($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}
