use std::path::{Component, Path, PathBuf};
use std::{env, fs, io};

/// Path of the cache derived from a dictionary: the full file name plus `extension`.
///
/// Keeping the source extension gives `lex.tsv` and `lex.xml` distinct caches.
///
/// Example:
/// `dicts/lefff.txt` + `"bin"` → `dicts/lefff.txt.bin`
pub(crate) fn cache_path<P: AsRef<Path>>(source: P, extension: &str) -> io::Result<PathBuf> {
	let source = source.as_ref();
	let name = source
		.file_name()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Dictionary path has no file name"))?;

	let mut cached = name.to_os_string();
	cached.push(".");
	cached.push(extension);
	Ok(source.with_file_name(cached))
}

/// Source name recorded in a lexicon: the file name without its extension.
///
/// `"./dicts/lefff.txt"` → `"lefff"`
pub(crate) fn source_name<P: AsRef<Path>>(path: P) -> io::Result<String> {
	path.as_ref()
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Dictionary path has no file name"))
}

/// Dictionary folder as configured, with `.` meaning the working directory.
pub(crate) fn resolve_folder(folder: &Path) -> PathBuf {
	if folder.as_os_str().is_empty() || folder == Path::new(".") || folder == Path::new("./") {
		return env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	}
	folder.to_path_buf()
}

/// Joins a dictionary name onto `folder`, refusing names that would leave it.
///
/// Only plain relative names are accepted: no root, no drive prefix, no `..`.
pub(crate) fn confined_join(folder: &Path, name: &str) -> Option<PathBuf> {
	let relative = Path::new(name);
	let plain = !name.is_empty()
		&& relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
	plain.then(|| folder.join(relative))
}

/// Lists the files of a directory whose extension is one of `extensions`.
///
/// Returns file names only (no paths), sorted.
pub(crate) fn list_files<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if !path.is_file() {
			continue;
		}

		let matches = path
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| extensions.contains(&ext));
		if matches {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Returns true when `derived` exists and was modified no earlier than `source`.
///
/// Missing timestamps count as stale.
pub(crate) fn is_up_to_date<P: AsRef<Path>, Q: AsRef<Path>>(source: P, derived: Q) -> bool {
	let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
	match (modified(source.as_ref()), modified(derived.as_ref())) {
		(Some(src), Some(dst)) => dst >= src,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cache_keeps_source_extension() {
		assert_eq!(cache_path("dicts/lefff.txt", "bin").unwrap(), PathBuf::from("dicts/lefff.txt.bin"));
		assert_ne!(cache_path("lex.tsv", "bin").unwrap(), cache_path("lex.xml", "bin").unwrap());
	}

	#[test]
	fn source_name_drops_extension() {
		assert_eq!(source_name("./dicts/morphalou.xml").unwrap(), "morphalou");
	}

	#[test]
	fn names_stay_inside_folder() {
		let folder = Path::new("dicts");
		assert_eq!(confined_join(folder, "lefff.txt"), Some(PathBuf::from("dicts/lefff.txt")));
		assert_eq!(confined_join(folder, "extra/lefff.txt"), Some(PathBuf::from("dicts/extra/lefff.txt")));
		assert_eq!(confined_join(folder, "/etc/passwd"), None);
		assert_eq!(confined_join(folder, "../secret.txt"), None);
		assert_eq!(confined_join(folder, "extra/../../secret.txt"), None);
		assert_eq!(confined_join(folder, ""), None);
	}

	#[test]
	fn lists_matching_files_sorted() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("b.tsv"), "").unwrap();
		fs::write(dir.path().join("a.xml"), "").unwrap();
		fs::write(dir.path().join("c.tsv.bin"), "").unwrap();

		let files = list_files(dir.path(), &["tsv", "xml"]).unwrap();
		assert_eq!(files, vec!["a.xml".to_owned(), "b.tsv".to_owned()]);
	}

	#[test]
	fn missing_derived_file_is_stale() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("lefff.txt");
		fs::write(&source, "").unwrap();
		assert!(!is_up_to_date(&source, dir.path().join("lefff.txt.bin")));
	}
}
