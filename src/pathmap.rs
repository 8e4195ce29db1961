const SEPARATORS: [char; 2] = ['/', '\\'];

#[derive(Debug, Clone)]
pub struct PathMapper {
    prefix: String,
}

impl PathMapper {
    pub fn new(subfolder: Option<&str>) -> Self {
        Self {
            prefix: normalize_prefix(subfolder.unwrap_or("")),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn to_blob_path(&self, native_path: &str) -> String {
        let trimmed = native_path.trim_start_matches(SEPARATORS);
        let mut key = String::with_capacity(self.prefix.len() + trimmed.len());
        key.push_str(&self.prefix);
        for c in trimmed.chars() {
            key.push(if c == '\\' { '/' } else { c });
        }
        key
    }

    pub fn to_native_path(&self, blob_path: &str) -> String {
        // Prefix strip is case-insensitive; the store itself stays case-sensitive.
        let rest = if blob_path.len() >= self.prefix.len()
            && blob_path[..self.prefix.len()].eq_ignore_ascii_case(&self.prefix)
        {
            &blob_path[self.prefix.len()..]
        } else {
            blob_path
        };

        let mut native = String::with_capacity(rest.len() + 1);
        native.push('\\');
        for c in rest.chars() {
            native.push(if c == '/' { '\\' } else { c });
        }
        native
    }

    pub fn list_prefix(&self, native_path: &str) -> String {
        let mut key = self.to_blob_path(native_path);
        if !key.is_empty() && !key.ends_with('/') {
            key.push('/');
        }
        key
    }
}

pub fn is_root_path(native_path: &str) -> bool {
    native_path.chars().all(|c| SEPARATORS.contains(&c))
}

pub fn leaf_name(blob_path: &str) -> &str {
    let trimmed = blob_path.strip_suffix('/').unwrap_or(blob_path);
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

pub fn parent_prefix(blob_path: &str) -> &str {
    let trimmed = blob_path.strip_suffix('/').unwrap_or(blob_path);
    match trimmed.rfind('/') {
        Some(idx) => &blob_path[..=idx],
        None => "",
    }
}

fn normalize_prefix(subfolder: &str) -> String {
    let trimmed = subfolder.trim_matches(SEPARATORS);
    if trimmed.is_empty() {
        return String::new();
    }
    let mut prefix: String = trimmed
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();
    prefix.push('/');
    prefix
}
