//! # assetpipe
//!
//! A single-binary front-end asset build. Sources under `src/` become a
//! deployable static tree under `build/`: page templates, stylesheets, one
//! script bundle, optimized images and fonts, plus a development server with
//! live reload and a watcher that re-runs the affected task on every change.
//!
//! # Architecture: Independent Content Tasks
//!
//! Every content task is a pipe from one set of source files, through one
//! third-party transform, into its own part of the output tree:
//!
//! ```text
//! pug      src/templates/pages/*.hbs   →  build/*.html          (handlebars)
//! sass     src/sass/*.{sass,scss}      →  build/css/            (grass, lightningcss)
//! webpack  src/js/index.js             →  build/js/             (esbuild)
//! img      src/assets/img/**           →  build/assets/img/     (image, cached)
//! fonts    src/fonts/**                →  build/fonts/          (copy)
//! ```
//!
//! Because the destinations are disjoint, `build` runs the five tasks in
//! parallel after `clean`, and `watch` can re-run any one of them alone.
//!
//! The mode (development or production) is read from `NODE_ENV` once at
//! startup and carried in an immutable [`context::BuildContext`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`mode`] | `NODE_ENV` → development / production |
//! | [`config`] | `assetpipe.toml` loading, merging over stock defaults, validation |
//! | [`layout`] | Source and output paths of a project |
//! | [`context`] | Mode + layout + config handed to every task |
//! | [`files`] | File-set collection, `clean`, verbatim tree copy |
//! | [`templates`] | Page rendering with handlebars partials |
//! | [`styles`] | Sass compilation, source maps, production prefixing |
//! | [`scripts`] | Script bundling behind the [`scripts::ScriptBundler`] trait |
//! | [`images`] | Image optimization behind the [`images::ImageOptimizer`] trait |
//! | [`cache`] | Content-addressed cache of optimized images |
//! | [`notifier`] | Surfacing recoverable compile errors to the developer |
//! | [`tasks`] | Task names, [`tasks::Pipeline`], `build` orchestration |
//! | [`server`] | Static dev server with live reload |
//! | [`watch`] | Source watching and per-task rebuild workers |
//! | [`output`] | CLI output formatting of task reports |
//!
//! # Design Decisions
//!
//! ## Error Taxonomy
//!
//! Failures are treated per task, so that a long-running `watch` survives
//! the mistakes made while editing:
//!
//! - template errors fail the `pug` run;
//! - stylesheet errors are logged per file and the `sass` run succeeds;
//! - script compile errors go to the [`notifier::Notifier`] and the
//!   `webpack` run succeeds without writing a bundle;
//! - filesystem errors fail the task that hit them.
//!
//! ## Cache Outside the Output Tree
//!
//! `clean` removes `build/` before every build, so optimized images are
//! cached in `.assetpipe-cache/` next to it. See [`cache`].

pub mod cache;
pub mod config;
pub mod context;
pub mod files;
pub mod images;
pub mod layout;
pub mod mode;
pub mod notifier;
pub mod output;
pub mod scripts;
pub mod server;
pub mod styles;
pub mod tasks;
pub mod templates;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
