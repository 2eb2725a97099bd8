use docbot_core::config::DocsConfig;

/// Operations the documentation server exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocsTool {
    Search,
    Fetch,
    List,
    Prefetch,
    CacheStatus,
}

impl DocsTool {
    pub const ALL: [DocsTool; 5] =
        [Self::Search, Self::Fetch, Self::List, Self::Prefetch, Self::CacheStatus];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Fetch => "fetch",
            Self::List => "list",
            Self::Prefetch => "prefetch",
            Self::CacheStatus => "cache_status",
        }
    }
}

/// Server-side tool names, taken from `[docs]` config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolNames {
    pub search: String,
    pub fetch: String,
    pub list: String,
    pub prefetch: String,
    pub cache_status: String,
}

impl ToolNames {
    pub fn from_config(config: &DocsConfig) -> Self {
        Self {
            search: config.search_tool.clone(),
            fetch: config.fetch_tool.clone(),
            list: config.list_tool.clone(),
            prefetch: config.prefetch_tool.clone(),
            cache_status: config.cache_status_tool.clone(),
        }
    }

    pub fn name(&self, tool: DocsTool) -> &str {
        match tool {
            DocsTool::Search => &self.search,
            DocsTool::Fetch => &self.fetch,
            DocsTool::List => &self.list,
            DocsTool::Prefetch => &self.prefetch,
            DocsTool::CacheStatus => &self.cache_status,
        }
    }

    /// Configured operations the server does not advertise.
    pub fn missing_from<'a>(&'a self, advertised: &[String]) -> Vec<(DocsTool, &'a str)> {
        DocsTool::ALL
            .into_iter()
            .map(|tool| (tool, self.name(tool)))
            .filter(|(_, name)| !advertised.iter().any(|candidate| candidate == name))
            .collect()
    }
}

impl Default for ToolNames {
    fn default() -> Self {
        Self::from_config(&docbot_core::AppConfig::default().docs)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocsTool, ToolNames};

    #[test]
    fn default_names_match_the_public_docs_server() {
        let names = ToolNames::default();
        assert_eq!(names.name(DocsTool::Search), "SearchNgrokDocumentation");
        assert_eq!(DocsTool::ALL.len(), 5);
    }

    #[test]
    fn missing_tools_are_reported_by_operation() {
        let names = ToolNames::default();
        let advertised = vec!["SearchNgrokDocumentation".to_string(), "FetchNgrokDoc".to_string()];

        let missing = names.missing_from(&advertised);

        assert_eq!(missing.len(), 3);
        assert!(missing.iter().all(|(tool, _)| !matches!(tool, DocsTool::Search | DocsTool::Fetch)));
    }
}
