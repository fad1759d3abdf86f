// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use beast_core::renderer::error::{ResourceError, ShaderError};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinesError {
    #[error("unbalanced conditional block in shader source at line {line}")]
    UnbalancedConditional { line: usize },
}

impl From<DefinesError> for ResourceError {
    fn from(err: DefinesError) -> Self {
        ResourceError::Shader(ShaderError::CompilationError {
            label: "shader defines".to_string(),
            details: err.to_string(),
        })
    }
}

/// Flags and integer constants used to specialize WGSL source.
///
/// Flags drive `#ifdef NAME`, `#ifndef NAME`, `#else` and `#endif`
/// lines. Constants are emitted as `const NAME: u32` declarations ahead of
/// the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    flags: Vec<&'static str>,
    constants: Vec<(&'static str, u32)>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: &'static str) -> &mut Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    pub fn set_constant(&mut self, name: &'static str, value: u32) -> &mut Self {
        match self.constants.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.constants.push((name, value)),
        }
        self
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| *f == flag)
    }

    /// Specializes `source`.
    pub fn apply(&self, source: &str) -> Result<String, DefinesError> {
        let mut out = String::with_capacity(source.len() + 64 * self.constants.len());
        for (name, value) in &self.constants {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "const {name}: u32 = {value}u;");
        }

        // Each entry: (enclosing block active, this branch active).
        let mut stack: Vec<(bool, bool)> = Vec::new();
        let active = |stack: &[(bool, bool)]| stack.last().map_or(true, |&(outer, this)| outer && this);

        for (number, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();
            let line_number = number + 1;
            if let Some(flag) = trimmed.strip_prefix("#ifdef") {
                let outer = active(&stack);
                stack.push((outer, self.is_set(flag.trim())));
            } else if let Some(flag) = trimmed.strip_prefix("#ifndef") {
                let outer = active(&stack);
                stack.push((outer, !self.is_set(flag.trim())));
            } else if trimmed.starts_with("#else") {
                let top = stack
                    .last_mut()
                    .ok_or(DefinesError::UnbalancedConditional { line: line_number })?;
                top.1 = !top.1;
            } else if trimmed.starts_with("#endif") {
                stack
                    .pop()
                    .ok_or(DefinesError::UnbalancedConditional { line: line_number })?;
            } else if active(&stack) {
                out.push_str(line);
                out.push('\n');
            }
        }

        if !stack.is_empty() {
            return Err(DefinesError::UnbalancedConditional {
                line: source.lines().count(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "a\n#ifdef MSAA\nb\n#ifndef KIND_SPOT\nc\n#else\nd\n#endif\n#else\ne\n#endif\nf\n";

    #[test]
    fn selects_branches_by_flag() {
        let mut defines = ShaderDefines::new();
        assert_eq!(defines.apply(SOURCE).unwrap(), "a\ne\nf\n");

        defines.set("MSAA");
        assert_eq!(defines.apply(SOURCE).unwrap(), "a\nb\nc\nf\n");

        defines.set("KIND_SPOT");
        assert_eq!(defines.apply(SOURCE).unwrap(), "a\nb\nd\nf\n");
    }

    #[test]
    fn emits_constants_first() {
        let mut defines = ShaderDefines::new();
        defines.set_constant("SHADOW_QUALITY", 2).set_constant("SHADOW_QUALITY", 3);
        assert_eq!(defines.apply("x\n").unwrap(), "const SHADOW_QUALITY: u32 = 3u;\nx\n");
    }

    #[test]
    fn rejects_unbalanced_blocks() {
        let defines = ShaderDefines::new();
        assert!(matches!(
            defines.apply("#endif\n"),
            Err(DefinesError::UnbalancedConditional { line: 1 })
        ));
        assert!(defines.apply("#ifdef MSAA\nx\n").is_err());
    }
}
