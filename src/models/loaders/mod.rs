pub mod csv_loader;
pub mod profile_loader;

pub use csv_loader::{parse_numbers, read_numbers};
pub use profile_loader::{builtin_profile, load_profile_file};
