pub mod item;
pub mod loaders;
pub mod outcome;
pub mod profile;
pub mod progress;

pub use item::Item;
pub use loaders::{builtin_profile, load_profile_file, parse_numbers, read_numbers};
pub use outcome::{Classification, Outcome, ERROR_STATUS, GENERAL_ERROR_STATUS, TIMEOUT_TAG};
pub use profile::{CheckSpec, OutcomeRule, PortalProfile, Probe};
pub use progress::{BatchProgress, BatchStatus, ProgressSnapshot};
