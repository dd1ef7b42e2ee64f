pub(crate) mod date;
pub(crate) mod hash;
pub(crate) mod process;
pub(crate) mod timezone;

pub(crate) use date::DateFilter;
pub(crate) use hash::{sha256_hex, short_hash};
pub(crate) use process::pid_alive;
pub(crate) use timezone::Timezone;
