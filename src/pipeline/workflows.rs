use crate::core::errors::{BugxError, BugxResult};
use crate::tools::registry::ToolRegistry;
use std::collections::{BTreeMap, HashSet};

const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("recon", "Subdomains from three sources, probed for live HTTP", &["subfinder", "assetfinder", "amass", "httpx"]),
    ("discovery", "Subdomain enumeration only", &["subfinder", "assetfinder", "amass"]),
    ("passive", "Archived URLs without touching the target", &["gau", "waybackurls"]),
    ("probe", "Resolve subdomains, then probe them", &["subfinder", "dnsx", "httpx"]),
    ("fuzz", "Content discovery against the base URL", &["ffuf", "gobuster", "feroxbuster"]),
    ("xss", "Crawl, filter XSS candidates, scan with dalfox and nuclei", &["subfinder", "httpx", "katana", "gau", "gf-xss", "dalfox", "nuclei-xss"]),
    ("sqli", "Crawl, filter SQLi candidates, scan with nuclei and sqlmap", &["subfinder", "httpx", "katana", "gau", "gf-sqli", "nuclei-sqli", "sqlmap", "arjun"]),
    ("lfi", "Crawl, filter file inclusion candidates, scan", &["subfinder", "httpx", "katana", "gau", "gf-lfi", "nuclei-lfi"]),
    ("ssrf", "Crawl, filter SSRF candidates, scan", &["subfinder", "httpx", "katana", "gau", "gf-ssrf", "nuclei-ssrf"]),
    ("rce", "Crawl, filter RCE candidates, scan", &["subfinder", "httpx", "katana", "gau", "gf-rce", "nuclei-rce"]),
    ("takeover", "Subdomain takeover checks", &["subfinder", "subjack", "nuclei-takeover"]),
    ("exposure", "Exposed configs and disclosures", &["subfinder", "httpx", "katana", "gau", "nuclei-exposure"]),
    ("auth", "Authentication weaknesses", &["subfinder", "httpx", "katana", "gau", "nuclei-auth"]),
    ("api", "API parameters and endpoints", &["subfinder", "httpx", "katana", "gau", "arjun", "nuclei-api"]),
    ("full", "Crawl everything and run the default nuclei scan", &["subfinder", "httpx", "katana", "gau", "nuclei"]),
    ("post", "Screenshots of live hosts", &["subfinder", "httpx", "gowitness"]),
];

/// Name that runs every scan workflow in turn.
pub const ALL_WORKFLOWS: &str = "all";

/// Workflows `all` runs, in order.
const ALL_SET: &[&str] = &[
    "xss", "sqli", "lfi", "ssrf", "rce", "takeover", "exposure", "auth", "api", "full",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
}

/// Named workflows: the built-in set plus `[workflows]` from config.
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    workflows: BTreeMap<String, Workflow>,
}

impl WorkflowCatalog {
    pub fn builtin() -> Self {
        let workflows = BUILTIN
            .iter()
            .map(|(name, description, steps)| {
                (
                    name.to_string(),
                    Workflow {
                        name: name.to_string(),
                        description: description.to_string(),
                        steps: steps.iter().map(|s| s.to_string()).collect(),
                    },
                )
            })
            .collect();
        Self { workflows }
    }

    /// User entries add to the built-ins or replace one of the same name.
    pub fn with_user(mut self, user: &BTreeMap<String, Vec<String>>) -> Self {
        for (name, steps) in user {
            self.workflows.insert(
                name.clone(),
                Workflow {
                    name: name.clone(),
                    description: "user defined".to_string(),
                    steps: steps.clone(),
                },
            );
        }
        self
    }

    pub fn get(&self, name: &str) -> BugxResult<&Workflow> {
        self.workflows
            .get(name)
            .ok_or_else(|| BugxError::UnknownWorkflow(name.to_string()))
    }

    /// Workflows to run for `name`: one, or the whole scan set for `all`
    /// unless a user workflow took that name.
    pub fn resolve(&self, name: &str) -> BugxResult<Vec<&Workflow>> {
        if name == ALL_WORKFLOWS && !self.workflows.contains_key(name) {
            return ALL_SET.iter().map(|n| self.get(n)).collect();
        }
        Ok(vec![self.get(name)?])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }

    /// Every workflow must name known tools, once each.
    pub fn validate(&self, registry: &ToolRegistry) -> BugxResult<()> {
        for workflow in self.workflows.values() {
            validate_steps(&workflow.steps, registry).map_err(|e| match e {
                BugxError::InvalidConfig(reason) => {
                    BugxError::InvalidConfig(format!("workflow '{}': {}", workflow.name, reason))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Checks an ordered step list: non-empty, known ids, no repeats.
pub fn validate_steps<S: AsRef<str>>(steps: &[S], registry: &ToolRegistry) -> BugxResult<()> {
    if steps.is_empty() {
        return Err(BugxError::InvalidConfig("no tools selected".to_string()));
    }
    let mut seen = HashSet::new();
    for step in steps {
        let id = step.as_ref();
        registry.lookup(id)?;
        if !seen.insert(id) {
            return Err(BugxError::InvalidConfig(format!("tool '{}' listed twice", id)));
        }
    }
    Ok(())
}

/// Splits a `--tools a,b,c` value.
pub fn parse_tool_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_workflows_are_valid() {
        let registry = ToolRegistry::builtin().unwrap();
        let catalog = WorkflowCatalog::builtin();
        catalog.validate(&registry).unwrap();
        assert_eq!(
            catalog.get("recon").unwrap().steps,
            vec!["subfinder", "assetfinder", "amass", "httpx"]
        );
        assert_eq!(catalog.iter().count(), BUILTIN.len());
    }

    #[test]
    fn test_unknown_workflow() {
        let catalog = WorkflowCatalog::builtin();
        assert!(matches!(
            catalog.get("nope"),
            Err(BugxError::UnknownWorkflow(_))
        ));
    }

    #[test]
    fn test_user_workflows_add_and_replace() {
        let mut user = BTreeMap::new();
        user.insert("quick".to_string(), vec!["subfinder".to_string(), "httpx".to_string()]);
        user.insert("recon".to_string(), vec!["subfinder".to_string()]);
        let catalog = WorkflowCatalog::builtin().with_user(&user);

        assert_eq!(catalog.get("quick").unwrap().steps.len(), 2);
        assert_eq!(catalog.get("recon").unwrap().steps, vec!["subfinder"]);
    }

    #[test]
    fn test_validate_steps_rejects_duplicates_and_unknowns() {
        let registry = ToolRegistry::builtin().unwrap();
        assert!(validate_steps(&["subfinder", "httpx"], &registry).is_ok());

        let err = validate_steps(&["httpx", "httpx"], &registry).unwrap_err();
        assert!(err.to_string().contains("listed twice"));

        let err = validate_steps(&["subfinder", "made-up"], &registry).unwrap_err();
        assert!(matches!(err, BugxError::UnknownTool(_)));

        let empty: [&str; 0] = [];
        assert!(validate_steps(&empty, &registry).is_err());
    }

    #[test]
    fn test_user_workflow_with_unknown_tool_fails_validation() {
        let registry = ToolRegistry::builtin().unwrap();
        let mut user = BTreeMap::new();
        user.insert("bad".to_string(), vec!["subfinder".to_string(), "ghost".to_string()]);
        let catalog = WorkflowCatalog::builtin().with_user(&user);
        assert!(matches!(
            catalog.validate(&registry),
            Err(BugxError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_parse_tool_list() {
        assert_eq!(
            parse_tool_list(" subfinder, httpx ,,nuclei "),
            vec!["subfinder", "httpx", "nuclei"]
        );
    }

    #[test]
    fn test_all_runs_every_scan_workflow() {
        let catalog = WorkflowCatalog::builtin();
        let names: Vec<_> = catalog
            .resolve(ALL_WORKFLOWS)
            .unwrap()
            .iter()
            .map(|w| w.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["xss", "sqli", "lfi", "ssrf", "rce", "takeover", "exposure", "auth", "api", "full"]
        );

        let single = catalog.resolve("recon").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "recon");
        assert!(matches!(catalog.resolve("nope"), Err(BugxError::UnknownWorkflow(_))));
    }

    #[test]
    fn test_user_workflow_named_all_wins() {
        let mut user = BTreeMap::new();
        user.insert("all".to_string(), vec!["subfinder".to_string()]);
        let catalog = WorkflowCatalog::builtin().with_user(&user);
        let resolved = catalog.resolve(ALL_WORKFLOWS).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].steps, vec!["subfinder"]);
    }
}
