#![allow(dead_code)]

use std::fs;
use std::path::Path;

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

/// Writes `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str, executable: bool) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    set_mode(&path, if executable { 0o755 } else { 0o644 });
}

pub const CPU_PLUGIN: &str = r#"#!/bin/sh

: << =cut

=head1 NAME

cpu - Plugin to monitor CPU usage.

=cut

#%# family=auto
#%# capabilities=autoconf

echo "graph_category system"
"#;

pub const APACHE_PLUGIN: &str = r#"#!/usr/bin/perl -w
#%# family=contrib
#%# capabilities=autoconf suggest
print "graph_category webserver\n";
print "graph_category mysql\n";
"#;

pub const EXOTIC_PLUGIN: &str = "#!/usr/bin/env python3\nprint('graph_category tinkering')\n";

/// A small core-like plugin tree.
///
/// ```text
/// node.d/apache_.in            (not executable, optional suffix)
/// node.d.linux/cpu             (executable)
/// node.d.linux/README          (not executable, ignored)
/// node.d.linux/example-graphs/cpu-{day,week,1,extra}.png
/// node.d.c/multicpu.c          (compiled)
/// node.d.debug/debug_plugin    (executable, skipped directory)
/// contrib/exotic               (executable)
/// ```
pub fn build_plugin_tree(root: &Path) {
    write_file(root, "node.d/apache_.in", APACHE_PLUGIN, false);
    write_file(root, "node.d.linux/cpu", CPU_PLUGIN, true);
    write_file(root, "node.d.linux/README", "not a plugin\n", false);
    for key in ["week", "day", "1", "extra"] {
        write_file(
            root,
            &format!("node.d.linux/example-graphs/cpu-{key}.png"),
            "png",
            false,
        );
    }
    write_file(root, "node.d.c/multicpu.c", "int main() { return 0; }\n", false);
    write_file(root, "node.d.debug/debug_plugin", "#!/bin/sh\n", true);
    write_file(root, "contrib/exotic", EXOTIC_PLUGIN, true);
}
