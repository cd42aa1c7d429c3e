//! Shared test utilities for the assetpipe test suite.
//!
//! Provides project fixtures in temp directories and tree snapshots for
//! comparing build output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_project();
//! let ctx = project_context(tmp.path(), Mode::Production);
//! // ... run tasks ...
//! let tree = snapshot_tree(&tmp.path().join("build"));
//! assert!(tree.contains_key("css/main.css"));
//! ```

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::ProjectConfig;
use crate::context::BuildContext;
use crate::mode::Mode;

// =========================================================================
// Fixture setup
// =========================================================================

/// Context for a project at `root` with the stock configuration.
pub fn project_context(root: &Path, mode: Mode) -> BuildContext {
    BuildContext::new(root, mode, ProjectConfig::default())
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: impl AsRef<[u8]>) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A small PNG with a gradient, so re-encoding has something to work on.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90, 255])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A complete project with every source kind the tasks read.
///
/// ```text
/// src/
/// ├── templates/
/// │   ├── partials/nav.hbs
/// │   └── pages/{index,about}.hbs
/// ├── sass/{main.scss,_variables.scss}
/// ├── js/index.js
/// ├── assets/img/{logo.png,icons/arrow.svg}
/// └── fonts/body.woff2
/// ```
pub fn setup_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_file(
        root,
        "src/templates/partials/nav.hbs",
        "<nav>\n  <a href=\"index.html\">Home</a>\n  <a href=\"about.html\">About</a>\n</nav>\n",
    );
    write_file(
        root,
        "src/templates/pages/index.hbs",
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>{{page}}</title>\n    \
         <link rel=\"stylesheet\" href=\"css/main.css\">\n  </head>\n  <body>\n    \
         {{> partials/nav}}\n    <img src=\"assets/img/logo.png\">\n    \
         <script src=\"js/index.js\"></script>\n  </body>\n</html>\n",
    );
    write_file(
        root,
        "src/templates/pages/about.hbs",
        "<!DOCTYPE html>\n<html>\n  <body>\n    {{> partials/nav}}\n    \
         <p>Built in {{mode}} mode.</p>\n  </body>\n</html>\n",
    );
    write_file(root, "src/sass/_variables.scss", "$gap: 1rem;\n$brand: #336699;\n");
    write_file(
        root,
        "src/sass/main.scss",
        "@import 'variables';\n\n.layout {\n  display: grid;\n  gap: $gap;\n  \
         grid-template-columns: 1fr 2fr;\n}\n\n.button {\n  color: $brand;\n  \
         user-select: none;\n}\n",
    );
    write_file(
        root,
        "src/js/index.js",
        "import { greet } from './greet';\n\ngreet('assetpipe');\n",
    );
    write_file(
        root,
        "src/js/greet.js",
        "export function greet(name) {\n  console.log(`hello ${name}`);\n}\n",
    );
    write_file(root, "src/assets/img/logo.png", png_bytes(32, 32));
    write_file(
        root,
        "src/assets/img/icons/arrow.svg",
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 10 10\"><path d=\"M0 5h10\"/></svg>\n",
    );
    write_file(root, "src/fonts/body.woff2", b"wOF2fakefontdata".as_slice());

    tmp
}

// =========================================================================
// Output inspection
// =========================================================================

/// Every file under `dir`, keyed by its forward-slash relative path.
pub fn snapshot_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (relative, std::fs::read(e.path()).unwrap())
        })
        .collect()
}
