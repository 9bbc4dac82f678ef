//! Third pipeline stage: checks a fetched payload against the funding manifest
//! format and builds the normalized [`FundingManifest`].
//!
//! Validation never stops at the first problem. Every rule is evaluated and
//! each violation is recorded with the dotted path of the offending field, in
//! document order, so the submitter gets the full list in one round trip.
//! The result depends on the input bytes alone.

use common::model::manifest::{
    Channel, Entity, Funding, FundingManifest, HistoryEntry, Plan, Project, UrlRef,
};
use common::model::validation::{ValidationError, ViolationKind};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

type Object = Map<String, Value>;

/// The only manifest version currently understood.
pub const MANIFEST_VERSION: &str = "v1.0.0";

const WELL_KNOWN_SUFFIX: &str = "/.well-known/funding-manifest-urls";
const MAX_URL_LEN: usize = 1024;

const ENTITY_TYPES: &[&str] = &["individual", "group", "organisation", "other"];
const ENTITY_ROLES: &[&str] = &["owner", "steward", "maintainer", "contributor", "other"];
const CHANNEL_TYPES: &[&str] = &["bank", "payment-provider", "cheque", "cash", "other"];
const PLAN_STATUSES: &[&str] = &["active", "inactive"];
const PLAN_FREQUENCIES: &[&str] = &[
    "one-time",
    "weekly",
    "fortnightly",
    "monthly",
    "yearly",
    "other",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(FundingManifest),
    Invalid(Vec<ValidationError>),
}

/// Holds the compiled patterns used by the field rules.
///
/// Built once at startup; `validate` itself only borrows it.
pub struct ManifestValidator {
    slug: Regex,
    tag: Regex,
    license: Regex,
    currency: Regex,
    email: Regex,
}

impl ManifestValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            slug: Regex::new(r"^[a-z0-9][a-z0-9-]{1,31}$")?,
            tag: Regex::new(r"^[a-z0-9-]{2,32}$")?,
            license: Regex::new(r"^spdx:[A-Za-z0-9.+-]+$")?,
            currency: Regex::new(r"^[A-Z]{3}$")?,
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?,
        })
    }

    pub fn validate(&self, raw: &[u8]) -> Validation {
        let document: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(e) => return malformed(format!("manifest is not valid JSON: {}", e)),
        };
        let Some(root) = document.as_object() else {
            return malformed("manifest must be a JSON object".to_string());
        };

        let mut checker = Checker {
            rules: self,
            errors: Vec::new(),
        };
        match checker.manifest(root) {
            Some(manifest) if checker.errors.is_empty() => Validation::Valid(manifest),
            _ => Validation::Invalid(checker.errors),
        }
    }
}

fn malformed(message: String) -> Validation {
    Validation::Invalid(vec![ValidationError::new(
        ViolationKind::Malformed,
        "",
        message,
    )])
}

fn field_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Checker<'r> {
    rules: &'r ManifestValidator,
    errors: Vec<ValidationError>,
}

impl<'r> Checker<'r> {
    fn report(&mut self, kind: ViolationKind, path: String, message: impl Into<String>) {
        self.errors.push(ValidationError::new(kind, path, message));
    }

    fn manifest(&mut self, root: &Object) -> Option<FundingManifest> {
        let version = self.text(root, "version", "", 1, 16);
        if let Some(v) = &version {
            if v != MANIFEST_VERSION {
                self.report(
                    ViolationKind::Invalid,
                    "version".to_string(),
                    format!("unsupported version '{}', expected {}", v, MANIFEST_VERSION),
                );
            }
        }

        let entity = self.object(root, "entity", "").and_then(|o| self.entity(o, "entity"));

        let projects = self.array(root, "projects", "", 1, usize::MAX).and_then(|items| {
            let mut seen = HashSet::new();
            let parsed: Vec<Option<Project>> = items
                .iter()
                .enumerate()
                .map(|(i, item)| self.project(item, &index_path("projects", i), &mut seen))
                .collect();
            parsed.into_iter().collect::<Option<Vec<_>>>()
        });

        let funding = self.object(root, "funding", "").and_then(|o| self.funding(o, "funding"));

        Some(FundingManifest {
            version: version?,
            entity: entity?,
            projects: projects?,
            funding: funding?,
        })
    }

    fn entity(&mut self, obj: &Object, path: &str) -> Option<Entity> {
        let entity_type = self.choice(obj, "type", path, ENTITY_TYPES);
        let role = self.choice(obj, "role", path, ENTITY_ROLES);
        let name = self.text(obj, "name", path, 1, 128);
        let email = self.text(obj, "email", path, 3, 128);
        if let Some(e) = &email {
            if !self.rules.email.is_match(e) {
                self.report(
                    ViolationKind::Invalid,
                    field_path(path, "email"),
                    "is not a valid e-mail address",
                );
            }
        }
        let phone = self.optional_text(obj, "phone", path, 32);
        let description = self.optional_text(obj, "description", path, 2048);
        let webpage_url = self.url_ref(obj, "webpageUrl", path);

        Some(Entity {
            entity_type: entity_type?,
            role: role?,
            name: name?,
            email: email?,
            phone: phone?,
            description: description?,
            webpage_url: webpage_url?,
        })
    }

    fn project(
        &mut self,
        value: &Value,
        path: &str,
        seen: &mut HashSet<String>,
    ) -> Option<Project> {
        let obj = self.as_object(value, path)?;

        let guid = self.guid(obj, path, seen);
        let name = self.text(obj, "name", path, 1, 256);
        let description = self.text(obj, "description", path, 5, 2048);
        let webpage_url = self.url_ref(obj, "webpageUrl", path);
        let repository_url = self.url_ref(obj, "repositoryUrl", path);
        let rules = self.rules;
        let licenses = self.array(obj, "licenses", path, 1, 5).and_then(|items| {
            let pattern = &rules.license;
            self.string_list(
                items,
                &field_path(path, "licenses"),
                |s| pattern.is_match(s),
                "must look like spdx:<ID>",
            )
        });
        let tags = self.array(obj, "tags", path, 1, 10).and_then(|items| {
            let pattern = &rules.tag;
            self.string_list(
                items,
                &field_path(path, "tags"),
                |s| pattern.is_match(s),
                "must be 2-32 lowercase letters, digits or hyphens",
            )
        });

        Some(Project {
            guid: guid?,
            name: name?,
            description: description?,
            webpage_url: webpage_url?,
            repository_url: repository_url?,
            licenses: licenses?,
            tags: tags?,
        })
    }

    fn funding(&mut self, obj: &Object, path: &str) -> Option<Funding> {
        let mut channel_guids = HashSet::new();
        let channels = self.array(obj, "channels", path, 1, usize::MAX).and_then(|items| {
            let parsed: Vec<Option<Channel>> = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = index_path(&field_path(path, "channels"), i);
                    self.channel(item, &item_path, &mut channel_guids)
                })
                .collect();
            parsed.into_iter().collect::<Option<Vec<_>>>()
        });

        let plans = self.array(obj, "plans", path, 1, usize::MAX).and_then(|items| {
            let mut seen = HashSet::new();
            let parsed: Vec<Option<Plan>> = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = index_path(&field_path(path, "plans"), i);
                    self.plan(item, &item_path, &mut seen, &channel_guids)
                })
                .collect();
            parsed.into_iter().collect::<Option<Vec<_>>>()
        });

        let history = match obj.get("history") {
            None | Some(Value::Null) => Some(Vec::new()),
            Some(_) => self.array(obj, "history", path, 0, usize::MAX).and_then(|items| {
                let parsed: Vec<Option<HistoryEntry>> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.history(item, &index_path(&field_path(path, "history"), i))
                    })
                    .collect();
                parsed.into_iter().collect::<Option<Vec<_>>>()
            }),
        };

        Some(Funding {
            channels: channels?,
            plans: plans?,
            history: history?,
        })
    }

    fn channel(
        &mut self,
        value: &Value,
        path: &str,
        seen: &mut HashSet<String>,
    ) -> Option<Channel> {
        let obj = self.as_object(value, path)?;

        let guid = self.guid(obj, path, seen);
        let channel_type = self.choice(obj, "type", path, CHANNEL_TYPES);
        let address = self.text(obj, "address", path, 1, 512);
        let description = self.optional_text(obj, "description", path, 500);

        Some(Channel {
            guid: guid?,
            channel_type: channel_type?,
            address: address?,
            description: description?,
        })
    }

    fn plan(
        &mut self,
        value: &Value,
        path: &str,
        seen: &mut HashSet<String>,
        channel_guids: &HashSet<String>,
    ) -> Option<Plan> {
        let obj = self.as_object(value, path)?;

        let guid = self.guid(obj, path, seen);
        let status = self.choice(obj, "status", path, PLAN_STATUSES);
        let name = self.text(obj, "name", path, 1, 128);
        let description = self.optional_text(obj, "description", path, 500);
        let amount = self.amount(obj, "amount", path);
        let currency = self.currency(obj, path);
        let frequency = self.choice(obj, "frequency", path, PLAN_FREQUENCIES);

        let channels_path = field_path(path, "channels");
        let channels = self.array(obj, "channels", path, 1, usize::MAX).and_then(|items| {
            let refs = self.string_list(items, &channels_path, |_| true, "")?;
            let mut dangling = false;
            for (i, guid) in refs.iter().enumerate() {
                if !channel_guids.contains(guid) {
                    dangling = true;
                    self.report(
                        ViolationKind::Reference,
                        index_path(&channels_path, i),
                        format!("unknown channel '{}'", guid),
                    );
                }
            }
            (!dangling).then_some(refs)
        });

        Some(Plan {
            guid: guid?,
            status: status?,
            name: name?,
            description: description?,
            amount: amount?,
            currency: currency?,
            frequency: frequency?,
            channels: channels?,
        })
    }

    fn history(&mut self, value: &Value, path: &str) -> Option<HistoryEntry> {
        let obj = self.as_object(value, path)?;

        let year = self.integer(obj, "year", path, 1970, 2075);
        let income = self.amount(obj, "income", path);
        let expenses = self.amount(obj, "expenses", path);
        let taxes = self.amount(obj, "taxes", path);
        let currency = self.currency(obj, path);
        let description = self.optional_text(obj, "description", path, 500);

        Some(HistoryEntry {
            year: year?,
            income: income?,
            expenses: expenses?,
            taxes: taxes?,
            currency: currency?,
            description: description?,
        })
    }

    fn url_ref(&mut self, obj: &Object, key: &str, path: &str) -> Option<UrlRef> {
        let inner = self.object(obj, key, path)?;
        let path = field_path(path, key);

        let url = self.url(inner, "url", &path);
        let well_known = self.optional_text(inner, "wellKnown", &path, MAX_URL_LEN);
        if let Some(Some(wk)) = &well_known {
            let wk_path = field_path(&path, "wellKnown");
            if self.check_url(wk, &wk_path) && !wk.ends_with(WELL_KNOWN_SUFFIX) {
                self.report(
                    ViolationKind::Invalid,
                    wk_path,
                    format!("must end in {}", WELL_KNOWN_SUFFIX),
                );
            }
        }

        Some(UrlRef {
            url: url?,
            well_known: well_known?,
        })
    }

    fn url(&mut self, obj: &Object, key: &str, path: &str) -> Option<String> {
        let value = self.text(obj, key, path, 1, MAX_URL_LEN)?;
        self.check_url(&value, &field_path(path, key)).then_some(value)
    }

    fn check_url(&mut self, value: &str, path: &str) -> bool {
        match Url::parse(value) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => true,
            Ok(_) => {
                self.report(ViolationKind::Invalid, path.to_string(), "must be an http(s) URL");
                false
            }
            Err(e) => {
                self.report(
                    ViolationKind::Invalid,
                    path.to_string(),
                    format!("is not a valid URL: {}", e),
                );
                false
            }
        }
    }

    fn guid(&mut self, obj: &Object, path: &str, seen: &mut HashSet<String>) -> Option<String> {
        let guid = self.text(obj, "guid", path, 1, 32)?;
        let guid_path = field_path(path, "guid");
        if !self.rules.slug.is_match(&guid) {
            self.report(
                ViolationKind::Invalid,
                guid_path,
                "must be 2-32 lowercase letters, digits or hyphens",
            );
            return None;
        }
        if !seen.insert(guid.clone()) {
            self.report(
                ViolationKind::Duplicate,
                guid_path,
                format!("guid '{}' is already used", guid),
            );
            return None;
        }
        Some(guid)
    }

    fn currency(&mut self, obj: &Object, path: &str) -> Option<String> {
        let code = self.text(obj, "currency", path, 3, 3)?;
        if self.rules.currency.is_match(&code) {
            Some(code)
        } else {
            self.report(
                ViolationKind::Invalid,
                field_path(path, "currency"),
                "must be a three letter uppercase ISO 4217 code",
            );
            None
        }
    }

    fn string_list<F>(
        &mut self,
        items: &[Value],
        path: &str,
        accept: F,
        message: &str,
    ) -> Option<Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let item_path = index_path(path, i);
            match item.as_str().map(str::trim) {
                Some(s) if s.is_empty() => {
                    ok = false;
                    self.report(ViolationKind::Required, item_path, "must not be empty");
                }
                Some(s) if !accept(s) => {
                    ok = false;
                    self.report(ViolationKind::Invalid, item_path, message);
                }
                Some(s) => out.push(s.to_string()),
                None => {
                    ok = false;
                    self.report(
                        ViolationKind::Type,
                        item_path,
                        format!("expected string, found {}", json_type(item)),
                    );
                }
            }
        }
        ok.then_some(out)
    }

    // Primitive field readers. Each reports its own violation and returns
    // `None` when the field can't be used.

    fn present<'v>(&mut self, obj: &'v Object, key: &str, path: &str) -> Option<&'v Value> {
        match obj.get(key) {
            None | Some(Value::Null) => {
                self.report(ViolationKind::Required, field_path(path, key), "is required");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn as_object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Object> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.report(
                    ViolationKind::Type,
                    path.to_string(),
                    format!("expected object, found {}", json_type(value)),
                );
                None
            }
        }
    }

    fn object<'v>(&mut self, obj: &'v Object, key: &str, path: &str) -> Option<&'v Object> {
        let value = self.present(obj, key, path)?;
        self.as_object(value, &field_path(path, key))
    }

    fn array<'v>(
        &mut self,
        obj: &'v Object,
        key: &str,
        path: &str,
        min: usize,
        max: usize,
    ) -> Option<&'v [Value]> {
        let value = self.present(obj, key, path)?;
        let path = field_path(path, key);
        let Some(items) = value.as_array() else {
            self.report(
                ViolationKind::Type,
                path,
                format!("expected array, found {}", json_type(value)),
            );
            return None;
        };
        if items.len() < min {
            let kind = if items.is_empty() {
                ViolationKind::Required
            } else {
                ViolationKind::Invalid
            };
            self.report(kind, path, format!("needs at least {} entries", min));
            return None;
        }
        if items.len() > max {
            self.report(ViolationKind::Invalid, path, format!("allows at most {} entries", max));
            return None;
        }
        Some(items.as_slice())
    }

    fn text(
        &mut self,
        obj: &Object,
        key: &str,
        path: &str,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let value = self.present(obj, key, path)?;
        let path = field_path(path, key);
        let Some(s) = value.as_str() else {
            self.report(
                ViolationKind::Type,
                path,
                format!("expected string, found {}", json_type(value)),
            );
            return None;
        };
        let s = s.trim();
        let len = s.chars().count();
        if len == 0 {
            self.report(ViolationKind::Required, path, "must not be empty");
            None
        } else if len < min || len > max {
            self.report(
                ViolationKind::Invalid,
                path,
                format!("length must be between {} and {} characters", min, max),
            );
            None
        } else {
            Some(s.to_string())
        }
    }

    /// `Some(None)` when absent, `None` when present but unusable.
    fn optional_text(
        &mut self,
        obj: &Object,
        key: &str,
        path: &str,
        max: usize,
    ) -> Option<Option<String>> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) if s.trim().is_empty() => Some(None),
            Some(_) => self.text(obj, key, path, 1, max).map(Some),
        }
    }

    fn choice<T: DeserializeOwned>(
        &mut self,
        obj: &Object,
        key: &str,
        path: &str,
        allowed: &[&str],
    ) -> Option<T> {
        let value = self.text(obj, key, path, 1, 64)?;
        if !allowed.contains(&value.as_str()) {
            self.report(
                ViolationKind::Invalid,
                field_path(path, key),
                format!("'{}' is not one of: {}", value, allowed.join(", ")),
            );
            return None;
        }
        match serde_json::from_value(Value::String(value)) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.report(ViolationKind::Invalid, field_path(path, key), e.to_string());
                None
            }
        }
    }

    fn amount(&mut self, obj: &Object, key: &str, path: &str) -> Option<f64> {
        let value = self.present(obj, key, path)?;
        let path = field_path(path, key);
        match value.as_f64() {
            Some(n) if n >= 0.0 && n.is_finite() => Some(n),
            Some(_) => {
                self.report(ViolationKind::Invalid, path, "must not be negative");
                None
            }
            None => {
                self.report(
                    ViolationKind::Type,
                    path,
                    format!("expected number, found {}", json_type(value)),
                );
                None
            }
        }
    }

    fn integer(&mut self, obj: &Object, key: &str, path: &str, min: i64, max: i64) -> Option<i64> {
        let value = self.present(obj, key, path)?;
        let path = field_path(path, key);
        match value.as_i64() {
            Some(n) if (min..=max).contains(&n) => Some(n),
            Some(_) => {
                self.report(
                    ViolationKind::Invalid,
                    path,
                    format!("must be between {} and {}", min, max),
                );
                None
            }
            None => {
                self.report(
                    ViolationKind::Type,
                    path,
                    format!("expected integer, found {}", json_type(value)),
                );
                None
            }
        }
    }
}
