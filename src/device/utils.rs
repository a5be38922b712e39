/// 平台标识 → 展示名称
///
/// 同时接受 Node 风格（`darwin`、`win32`）和 Rust 风格（`macos`、`windows`）的标识，
/// 未知平台原样返回。
pub fn os_display_name(platform: &str) -> &str {
    match platform {
        "darwin" | "macos" => "Mac",
        "freebsd" => "FreeBSD",
        "linux" => "Linux",
        "win32" | "windows" => "Windows",
        other => other,
    }
}
