
#[cfg(windows)]
fn main() {
    println!("cargo:rerun-if-changed=assets/icon.ico");
    // The icon is optional; builds without it just keep the default one.
    if std::path::Path::new("assets/icon.ico").exists() {
        let mut res = winres::WindowsResource::new();
        res.set_icon("assets/icon.ico");
        if let Err(err) = res.compile() {
            println!("cargo:warning=failed to embed icon: {}", err);
        }
    }
}

#[cfg(not(windows))]
fn main() {}
