#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! eeg_log {
    (trace, $s:literal $(, $x:expr)*) => { defmt::trace!($s $(, $x)*) };
    (debug, $s:literal $(, $x:expr)*) => { defmt::debug!($s $(, $x)*) };
    (info,  $s:literal $(, $x:expr)*) => { defmt::info!($s $(, $x)*) };
    (warn,  $s:literal $(, $x:expr)*) => { defmt::warn!($s $(, $x)*) };
    (error, $s:literal $(, $x:expr)*) => { defmt::error!($s $(, $x)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! eeg_log {
    ($level:ident, $s:literal $(, $x:expr)*) => {{ $( let _ = &$x; )* }};
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => (eeg_log!(trace, $s $(, $x)*));
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => (eeg_log!(debug, $s $(, $x)*));
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => (eeg_log!(info, $s $(, $x)*));
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => (eeg_log!(warn, $s $(, $x)*));
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => (eeg_log!(error, $s $(, $x)*));
}
