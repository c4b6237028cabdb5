//! Stage preludes for shader snippets that arrive without a preamble.
//!
//! Shaders embedded in host applications (WebGL materials and the like) rely
//! on the host to inject `#version`, precision and the standard uniforms and
//! attributes. Without them every reference is an undeclared identifier, so
//! such text gets a stage-appropriate prelude before validation.

use std::borrow::Cow;

use glint_types::ShaderStage;

const VERTEX_PRELUDE: &str = "\
#version 100
precision highp float;
uniform mat4 modelMatrix;
uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;
uniform mat3 normalMatrix;
uniform vec3 cameraPosition;
attribute vec3 position;
attribute vec3 normal;
attribute vec2 uv;
";

const FRAGMENT_PRELUDE: &str = "\
#version 100
precision highp float;
uniform mat4 viewMatrix;
uniform vec3 cameraPosition;
";

const COMPUTE_PRELUDE: &str = "\
#version 310 es
";

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Source text as it will be fed to the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource<'a> {
    pub text: Cow<'a, str>,
    /// Lines prepended ahead of the original text.
    pub line_offset: u32,
}

#[must_use]
pub fn prelude_for(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => VERTEX_PRELUDE,
        ShaderStage::Fragment => FRAGMENT_PRELUDE,
        ShaderStage::Compute => COMPUTE_PRELUDE,
    }
}

/// Whether the first significant line is a `#version` directive.
///
/// A leading byte-order mark, blank lines and comments before it are skipped.
#[must_use]
pub fn has_version_directive(text: &str) -> bool {
    let mut in_block_comment = false;
    for line in text.trim_start_matches(BYTE_ORDER_MARK).lines() {
        let mut rest = line.trim();
        loop {
            if in_block_comment {
                match rest.find("*/") {
                    Some(end) => {
                        rest = rest[end + 2..].trim_start();
                        in_block_comment = false;
                    }
                    None => break,
                }
            } else if let Some(after) = rest.strip_prefix("/*") {
                rest = after;
                in_block_comment = true;
            } else {
                break;
            }
        }
        if in_block_comment || rest.is_empty() || rest.starts_with("//") {
            continue;
        }
        return rest
            .strip_prefix('#')
            .is_some_and(|directive| directive.trim_start().starts_with("version"));
    }
    false
}

/// Prepend the stage prelude unless `text` already declares a version.
#[must_use]
pub fn stage_source(text: &str, stage: ShaderStage) -> StagedSource<'_> {
    if has_version_directive(text) {
        return StagedSource {
            text: Cow::Borrowed(text),
            line_offset: 0,
        };
    }
    let prelude = prelude_for(stage);
    let mut staged = String::with_capacity(prelude.len() + text.len());
    staged.push_str(prelude);
    // a mark after the prelude would no longer be at the start of the stream
    staged.push_str(text.trim_start_matches(BYTE_ORDER_MARK));
    StagedSource {
        text: Cow::Owned(staged),
        line_offset: prelude.lines().count() as u32,
    }
}
