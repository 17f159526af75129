//! Webpack configuration synthesis.
//!
//! Rendering is a pure string transformation: no filesystem access and no
//! validation of the produced JavaScript. A broken template only surfaces
//! when webpack itself loads the file.

use std::fmt;
use std::str::FromStr;

use handlebars::{Handlebars, RenderError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::assets::AssetRegistry;
use crate::static_url::StaticPrefix;

/// Default entry point referenced by the generated config
pub const DEFAULT_ENTRY: &str = "./dummy.js";

/// Public path emitted as `output.publicPath`
pub const DEFAULT_PUBLIC_PATH: &str = "./";

/// Built-in webpack config template
pub const WEBPACK_CONFIG_TEMPLATE: &str = r#"// generated webpack configuration
const path = require("path");
const CopyPlugin = require("copy-webpack-plugin");
const CssMinimizerPlugin = require("css-minimizer-webpack-plugin");
const HtmlWebpackPlugin = require("html-webpack-plugin");
const MiniCssExtractPlugin = require("mini-css-extract-plugin");
const TerserPlugin = require("terser-webpack-plugin");
const ImageMinimizerPlugin = require("image-minimizer-webpack-plugin");
const { extendDefaultPlugins } = require("svgo");
const { WebpackManifestPlugin } = require("webpack-manifest-plugin");

module.exports = {
  mode: "{{mode}}",
  entry: "{{entry}}",
  module: {
    rules: [
      { test: /\.js$/, use: "babel-loader" },
      { test: /.s?css$/, use: [MiniCssExtractPlugin.loader, "css-loader", "sass-loader"] },
      { test: /\.(jpe?g|png|gif|svg)$/i, type: "asset" },
    ],
  },
  output: {
    publicPath: "{{public_path}}",
    filename: "[name].js",
    clean: true,
  },
  plugins: [
    new CopyPlugin({
      patterns: [
{{#each copy_files}}
        { from: "{{source}}", to: "{{dest}}" },
{{/each}}
      ],
    }),
    new ImageMinimizerPlugin({
      minimizerOptions: {
        plugins: [
          ["gifsicle", { interlaced: true }],
          ["jpegtran", { progressive: true }],
          ["optipng", { optimizationLevel: 5 }],
        ],
      },
    }),
    new WebpackManifestPlugin({}),
  ],
  optimization: {
    moduleIds: 'deterministic',
    runtimeChunk: 'single',
    minimizer: [
      new TerserPlugin(),
      new CssMinimizerPlugin({
        test: /\.css$/i,
        minimizerOptions: {
          preset: [
            "default",
            {
              discardComments: { removeAll: true },
            },
          ],
        },
      }),
    ],
  },
};
"#;

/// Webpack `mode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    #[default]
    Development,
    Production,
    None,
}

impl CompileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileMode::Development => "development",
            CompileMode::Production => "production",
            CompileMode::None => "none",
        }
    }
}

impl fmt::Display for CompileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(CompileMode::Development),
            "production" => Ok(CompileMode::Production),
            "none" => Ok(CompileMode::None),
            other => Err(format!(
                "invalid mode '{other}' (expected development, production or none)"
            )),
        }
    }
}

/// Instruction for copy-webpack-plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyDirective {
    pub source: String,
    pub dest: String,
}

/// Everything the template needs, derived from the registry and mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub mode: CompileMode,
    pub prefix: StaticPrefix,
    pub copy_directives: Vec<CopyDirective>,
    pub entry: String,
}

impl BuildConfig {
    /// One copy directive per registered asset, in registry order
    pub fn from_registry(registry: &AssetRegistry, mode: CompileMode, prefix: StaticPrefix) -> Self {
        let copy_directives = registry
            .iter()
            .map(|asset| CopyDirective {
                source: path_for_js(&asset.source_path()),
                dest: prefix.join(&asset.public_path),
            })
            .collect();

        Self {
            mode,
            prefix,
            copy_directives,
            entry: DEFAULT_ENTRY.to_string(),
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Built-in template parameters
    pub fn context(&self) -> Map<String, Value> {
        let value = json!({
            "mode": self.mode.as_str(),
            "public_path": DEFAULT_PUBLIC_PATH,
            "static_prefix": self.prefix.as_str(),
            "entry": self.entry,
            "copy_files": self.copy_directives,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Forward slashes are valid on every platform node runs on
fn path_for_js(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Handlebars renderer for webpack configs
pub struct ConfigRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for ConfigRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Output is JavaScript, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render `template`; keys in `extra_context` replace built-in parameters
    pub fn render(
        &self,
        template: &str,
        config: &BuildConfig,
        extra_context: &Map<String, Value>,
    ) -> Result<String, RenderError> {
        let mut context = config.context();
        for (key, value) in extra_context {
            context.insert(key.clone(), value.clone());
        }
        self.handlebars
            .render_template(template, &Value::Object(context))
    }
}

/// Render a webpack config in one call
pub fn render(
    template: &str,
    config: &BuildConfig,
    extra_context: &Map<String, Value>,
) -> Result<String, RenderError> {
    ConfigRenderer::new().render(template, config, extra_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetStorage, FoundFile};

    fn registry(entries: &[(&str, &str)]) -> AssetRegistry {
        let mut registry = AssetRegistry::new();
        for (location, rel) in entries {
            registry.insert(FoundFile {
                relative_path: (*rel).to_string(),
                storage: AssetStorage::new(*location),
            });
        }
        registry
    }

    #[test]
    fn test_copy_directive_from_registry() {
        let config = BuildConfig::from_registry(
            &registry(&[("/src", "js/app.js")]),
            CompileMode::Production,
            StaticPrefix::new("static/"),
        );
        assert_eq!(
            config.copy_directives,
            vec![CopyDirective {
                source: "/src/js/app.js".to_string(),
                dest: "static/js/app.js".to_string(),
            }]
        );
    }

    #[test]
    fn test_default_template_renders_directives_in_order() {
        let config = BuildConfig::from_registry(
            &registry(&[("/b", "second.css"), ("/a", "first.js")]),
            CompileMode::Production,
            StaticPrefix::new("/static/"),
        );
        let out = render(WEBPACK_CONFIG_TEMPLATE, &config, &Map::new()).unwrap();

        assert!(out.contains(r#"mode: "production","#));
        assert!(out.contains(r#"entry: "./dummy.js","#));
        assert!(out.contains(r#"publicPath: "./","#));
        let second = out
            .find(r#"{ from: "/b/second.css", to: "static/second.css" },"#)
            .unwrap();
        let first = out.find(r#"{ from: "/a/first.js", to: "static/first.js" },"#).unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let config = BuildConfig::from_registry(
            &registry(&[("/src", "app.js"), ("/src", "app.css")]),
            CompileMode::Development,
            StaticPrefix::new("/static/"),
        );
        let mut extra = Map::new();
        extra.insert("devtool".to_string(), json!("source-map"));

        let renderer = ConfigRenderer::new();
        let a = renderer.render(WEBPACK_CONFIG_TEMPLATE, &config, &extra).unwrap();
        let b = renderer.render(WEBPACK_CONFIG_TEMPLATE, &config, &extra).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extra_context_overrides_builtin() {
        let config = BuildConfig::from_registry(
            &AssetRegistry::new(),
            CompileMode::Development,
            StaticPrefix::new("/static/"),
        );
        let mut extra = Map::new();
        extra.insert("mode".to_string(), json!("production"));
        extra.insert("public_path".to_string(), json!("/cdn/"));

        let out = render(WEBPACK_CONFIG_TEMPLATE, &config, &extra).unwrap();
        assert!(out.contains(r#"mode: "production","#));
        assert!(out.contains(r#"publicPath: "/cdn/","#));
        assert!(!out.contains("development"));
    }

    #[test]
    fn test_no_html_escaping() {
        let config = BuildConfig::from_registry(
            &AssetRegistry::new(),
            CompileMode::None,
            StaticPrefix::new("/"),
        );
        let out = render("{{a}} {{mode}}", &config, &{
            let mut m = Map::new();
            m.insert("a".to_string(), json!("x => x & 1 < 2"));
            m
        })
        .unwrap();
        assert_eq!(out, "x => x & 1 < 2 none");
    }

    #[test]
    fn test_malformed_template_is_render_error() {
        let config = BuildConfig::from_registry(
            &AssetRegistry::new(),
            CompileMode::None,
            StaticPrefix::new("/"),
        );
        assert!(render("{{#each copy_files}}", &config, &Map::new()).is_err());
    }

    #[test]
    fn test_compile_mode_parsing() {
        assert_eq!("production".parse::<CompileMode>(), Ok(CompileMode::Production));
        assert_eq!("none".parse::<CompileMode>(), Ok(CompileMode::None));
        assert!("fast".parse::<CompileMode>().is_err());
        assert_eq!(CompileMode::Development.to_string(), "development");
    }
}
