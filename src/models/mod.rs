pub mod remote_entry;

pub use remote_entry::{is_csv_name, is_dated_subfolder, local_file_name};
