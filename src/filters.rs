use serde::Serialize;

/// One element of a source's search filter form.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Header(String),
    Separator,
    /// `options` are (display name, uri part) pairs; `state` indexes into them.
    Select {
        key: String,
        name: String,
        options: Vec<(String, String)>,
        state: usize,
    },
}

impl Filter {
    pub fn select(key: &str, name: &str, options: &[(&str, &str)]) -> Self {
        Filter::Select {
            key: key.to_string(),
            name: name.to_string(),
            options: options
                .iter()
                .map(|(display, part)| (display.to_string(), part.to_string()))
                .collect(),
            state: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FilterList(pub Vec<Filter>);

impl FilterList {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.0.iter()
    }

    /// Uri part of the selected option of the select filter `key`.
    pub fn selected(&self, key: &str) -> Option<&str> {
        self.0.iter().find_map(|filter| match filter {
            Filter::Select {
                key: k,
                options,
                state,
                ..
            } if k == key => options.get(*state).map(|(_, part)| part.as_str()),
            _ => None,
        })
    }

    /// Select option `index` of filter `key`; out-of-range indices are ignored.
    pub fn set_state(&mut self, key: &str, index: usize) -> bool {
        for filter in &mut self.0 {
            if let Filter::Select {
                key: k,
                options,
                state,
                ..
            } = filter
            {
                if k == key && index < options.len() {
                    *state = index;
                    return true;
                }
            }
        }
        false
    }

    /// Select the option whose uri part equals `value`.
    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        let index = self.0.iter().find_map(|filter| match filter {
            Filter::Select { key: k, options, .. } if k == key => {
                options.iter().position(|(_, part)| part == value)
            }
            _ => None,
        });
        match index {
            Some(i) => self.set_state(key, i),
            None => false,
        }
    }
}
