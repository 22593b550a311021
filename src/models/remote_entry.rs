/// Check whether a listing entry under the log root is a dated subfolder.
///
/// The PLC names one directory per logging batch window as an 8-character
/// token (e.g. `20240101`) with no extension. Anything else under the root
/// (readme files, firmware blobs) is ignored.
/// Pure function
pub fn is_dated_subfolder(log_root: &str, full_path: &str) -> bool {
    let Some(leaf) = full_path.strip_prefix(log_root) else {
        return false;
    };
    let leaf = leaf.trim_start_matches('/');
    leaf.chars().count() == 8 && !leaf.contains('.')
}

/// Check whether an entry name is a CSV log file (case-insensitive)
/// Pure function
pub fn is_csv_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Map a remote file path to its local staging file name by stripping the
/// folder prefix; falls back to the last path component if the listing
/// returned an unexpected shape.
/// Pure function
pub fn local_file_name(folder: &str, remote_path: &str) -> String {
    remote_path
        .strip_prefix(folder)
        .map(|rest| rest.trim_start_matches('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or_else(|| remote_path.rsplit('/').next().unwrap_or(remote_path))
        .to_string()
}
