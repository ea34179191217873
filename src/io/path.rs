/// Everything up to and including the last `/`, empty when there is none.
pub fn directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "",
    }
}

/// Join a directory (as produced by [`directory`]) and a relative reference.
pub fn combine(directory: &str, relative: &str) -> String {
    format!("{}{}", directory, relative)
}
