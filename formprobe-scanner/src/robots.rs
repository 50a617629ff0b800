// robots.txt loading and evaluation

use crate::scope::Origin;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

impl Group {
    fn applies_to(&self, agent: &str) -> bool {
        let agent = agent.split('/').next().unwrap_or(agent).to_lowercase();
        self.agents
            .iter()
            .any(|a| a != "*" && (agent.contains(a.as_str()) || a.contains(agent.as_str())))
    }

    fn is_default(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }
}

/// Parsed robots.txt. An empty policy allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
}

impl RobotsPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_allow_all(&self) -> bool {
        self.groups.iter().all(|g| g.rules.is_empty())
    }

    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut last_was_agent = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !last_was_agent && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_lowercase());
                    last_was_agent = true;
                }
                "allow" | "disallow" => {
                    last_was_agent = false;
                    if current.agents.is_empty() {
                        continue;
                    }
                    if key == "disallow" && value.is_empty() {
                        // "Disallow:" with no path allows everything
                        continue;
                    }
                    current.rules.push(Rule {
                        allow: key == "allow",
                        path: value.to_string(),
                    });
                }
                _ => last_was_agent = false,
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// First matching rule of the agent's group (falling back to `*`) decides.
    pub fn can_fetch(&self, agent: &str, url: &Url) -> bool {
        if url.path() == "/robots.txt" {
            return true;
        }

        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let group = self
            .groups
            .iter()
            .find(|g| g.applies_to(agent))
            .or_else(|| self.groups.iter().find(|g| g.is_default()));

        let Some(group) = group else {
            return true;
        };

        group
            .rules
            .iter()
            .find(|rule| rule.path == "*" || target.starts_with(&rule.path))
            .map(|rule| rule.allow)
            .unwrap_or(true)
    }

    /// Fetches `{origin}/robots.txt` once. Anything but a 200 yields allow-all.
    pub async fn load(client: &Client, origin: &Origin) -> Self {
        let robots_url = origin.robots_url();

        match client.get(&robots_url).send().await {
            Ok(response) if response.status() == StatusCode::OK => match response.text().await {
                Ok(body) => {
                    info!(url = %robots_url, "robots.txt found, crawl rules apply");
                    Self::parse(&body)
                }
                Err(e) => {
                    warn!(url = %robots_url, error = %e, "failed to read robots.txt, allowing all");
                    Self::allow_all()
                }
            },
            Ok(response) => {
                info!(
                    url = %robots_url,
                    status = response.status().as_u16(),
                    "no robots.txt, crawl is unrestricted"
                );
                Self::allow_all()
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt request failed, allowing all");
                Self::allow_all()
            }
        }
    }
}
