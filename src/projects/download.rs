//! The download command shown to students. These are plain strings
//! for display and copying; nothing here runs a process.

pub fn download_url(origin: &str, zip_file_name: &str) -> String {
    format!(
        "{}/downloads/{}",
        origin.trim_end_matches('/'),
        zip_file_name
    )
}

pub fn download_command(origin: &str, zip_file_name: &str) -> String {
    format!(
        "curl -L -o {} \"{}\"",
        zip_file_name,
        download_url(origin, zip_file_name)
    )
}
