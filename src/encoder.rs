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

//! Dictionary-encodes one or more string columns into dense `i32`
//! codes, sharing a single dictionary so that the same string appearing
//! in different source columns always receives the same code.

use ahash::AHashMap;

use crate::error::{QueryError, Result};

/// Owns the forward (`String -> i32`) and inverse (`i32 -> String`)
/// dictionaries for the lifetime of one DIFF-JOIN evaluation. Codes
/// are assigned densely starting at 1, in first-seen order, so
/// encoding is deterministic given insertion order.
#[derive(Debug, Default)]
pub struct AttributeEncoder {
    forward: AHashMap<String, i32>,
    inverse: Vec<String>,
}

impl AttributeEncoder {
    pub fn new() -> Self {
        AttributeEncoder {
            forward: AHashMap::new(),
            inverse: Vec::new(),
        }
    }

    fn code_for(&mut self, value: &str) -> i32 {
        if let Some(&code) = self.forward.get(value) {
            return code;
        }
        let code = (self.inverse.len() + 1) as i32;
        self.forward.insert(value.to_string(), code);
        self.inverse.push(value.to_string());
        code
    }

    /// Encodes `key_columns` followed by `value_columns`, all sharing
    /// this encoder's dictionary, returning one `i32` array per input
    /// column in the same order. Null values are not accepted — every
    /// element of every input column must be a real string.
    pub fn encode_key_value_attributes(
        &mut self,
        key_columns: &[&[String]],
        value_columns: &[&[String]],
    ) -> Vec<Vec<i32>> {
        key_columns
            .iter()
            .chain(value_columns.iter())
            .map(|col| col.iter().map(|s| self.code_for(s)).collect())
            .collect()
    }

    /// Decodes a previously issued code back to its string.
    pub fn decode(&self, code: i32) -> Result<&str> {
        let idx = (code - 1) as usize;
        self.inverse
            .get(idx)
            .map(|s| s.as_str())
            .ok_or_else(|| QueryError::ColumnNotFound(format!("unknown encoded value {code}")))
    }
}
