// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator sub-commands.  Each one maps onto a single facade call and
// renders its result as JSON.

use std::collections::BTreeSet;

use recordvault_core::error::{RecordVaultError, Result};
use recordvault_core::{AccessRight, PermissionId, Principal, ResourceType};
use recordvault_security::SecurityService;
use serde_json::{Value, json};

pub const USAGE: &str = "\
usage: recordvault <command> [args]

commands:
  score <principal>
  audit [principal|-] [limit]
  audit --limit <n>
  permissions <principal>
  grant <granter> <grantee> <resource> <rights> [ttl-hours] [record|profile|full_access]
  revoke <granter> <permission-id>
  check <principal> <resource> <right>
  encrypt <principal> <plaintext>
  decrypt <principal> <envelope>";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Score {
        principal: Principal,
    },
    Audit {
        principal: Option<Principal>,
        limit: Option<usize>,
    },
    Permissions {
        principal: Principal,
    },
    Grant {
        granter: Principal,
        grantee: Principal,
        resource_id: String,
        resource_type: ResourceType,
        rights: BTreeSet<AccessRight>,
        ttl_hours: Option<f64>,
    },
    Revoke {
        granter: Principal,
        id: PermissionId,
    },
    Check {
        principal: Principal,
        resource_id: String,
        right: AccessRight,
    },
    Encrypt {
        principal: Principal,
        plaintext: String,
    },
    Decrypt {
        principal: Principal,
        envelope: String,
    },
}

impl Command {
    /// Parse `args` (without the program name).
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Err(RecordVaultError::invalid("missing command"));
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        match (name.as_str(), rest.as_slice()) {
            ("score", [principal]) => Ok(Self::Score {
                principal: Principal::from(*principal),
            }),
            ("audit", []) => Ok(Self::Audit {
                principal: None,
                limit: None,
            }),
            ("audit", ["--limit", limit]) => Ok(Self::Audit {
                principal: None,
                limit: Some(parse_number(limit, "limit")?),
            }),
            ("audit", [principal]) => Ok(Self::Audit {
                principal: principal_filter(principal),
                limit: None,
            }),
            ("audit", [principal, limit]) => Ok(Self::Audit {
                principal: principal_filter(principal),
                limit: Some(parse_number(limit, "limit")?),
            }),
            ("permissions", [principal]) => Ok(Self::Permissions {
                principal: Principal::from(*principal),
            }),
            ("grant", [granter, grantee, resource, rights, extra @ ..]) if extra.len() <= 2 => {
                let ttl_hours = extra
                    .first()
                    .map(|ttl| parse_number::<f64>(ttl, "ttl"))
                    .transpose()?;
                let resource_type = match extra.get(1) {
                    Some(kind) => kind.parse()?,
                    None => ResourceType::Record,
                };
                Ok(Self::Grant {
                    granter: Principal::from(*granter),
                    grantee: Principal::from(*grantee),
                    resource_id: (*resource).to_owned(),
                    resource_type,
                    rights: AccessRight::parse_set(rights)?,
                    ttl_hours,
                })
            }
            ("revoke", [granter, id]) => Ok(Self::Revoke {
                granter: Principal::from(*granter),
                id: id.parse()?,
            }),
            ("check", [principal, resource, right]) => Ok(Self::Check {
                principal: Principal::from(*principal),
                resource_id: (*resource).to_owned(),
                right: right.parse()?,
            }),
            ("encrypt", [principal, plaintext]) => Ok(Self::Encrypt {
                principal: Principal::from(*principal),
                plaintext: (*plaintext).to_owned(),
            }),
            ("decrypt", [principal, envelope]) => Ok(Self::Decrypt {
                principal: Principal::from(*principal),
                envelope: (*envelope).to_owned(),
            }),
            (other, _) => Err(RecordVaultError::invalid(format!(
                "unknown command or wrong arguments: `{other}`"
            ))),
        }
    }

    /// Whether the command changes stored state.
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Self::Score { .. } | Self::Audit { .. } | Self::Permissions { .. }
        )
    }

    /// Execute against `service`.
    pub fn run(self, service: &SecurityService) -> Result<Value> {
        match self {
            Self::Score { principal } => Ok(serde_json::to_value(service.score_report(&principal)?)?),
            Self::Audit { principal, limit } => {
                Ok(serde_json::to_value(service.query(principal.as_ref(), limit)?)?)
            }
            Self::Permissions { principal } => {
                Ok(serde_json::to_value(service.list_for_principal(&principal))?)
            }
            Self::Grant {
                granter,
                grantee,
                resource_id,
                resource_type,
                rights,
                ttl_hours,
            } => {
                let id = service.grant(&granter, &grantee, &resource_id, resource_type, rights, ttl_hours)?;
                Ok(json!({ "permissionId": id }))
            }
            Self::Revoke { granter, id } => {
                service.revoke(&granter, id)?;
                Ok(json!({ "revoked": id }))
            }
            Self::Check {
                principal,
                resource_id,
                right,
            } => Ok(json!({ "allowed": service.check(&principal, &resource_id, right) })),
            Self::Encrypt {
                principal,
                plaintext,
            } => Ok(json!({ "envelope": service.encrypt(&plaintext, &principal)? })),
            Self::Decrypt {
                principal,
                envelope,
            } => Ok(json!({ "plaintext": service.decrypt(&envelope, &principal)? })),
        }
    }
}

/// `-` and `*` mean "every principal".
fn principal_filter(raw: &str) -> Option<Principal> {
    match raw {
        "-" | "*" => None,
        other => Some(Principal::from(other)),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RecordVaultError::invalid(format!("{what} `{raw}` is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordvault_core::SecurityConfig;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn parses_grant_with_defaults() {
        let command = Command::parse(&args("grant alice bob rec1 read,share")).unwrap();
        let Command::Grant {
            resource_type,
            rights,
            ttl_hours,
            ..
        } = command
        else {
            panic!("expected grant");
        };
        assert_eq!(resource_type, ResourceType::Record);
        assert_eq!(rights.len(), 2);
        assert_eq!(ttl_hours, None);
    }

    #[test]
    fn parses_grant_with_ttl_and_type() {
        let command = Command::parse(&args("grant alice bob p1 read 2.5 profile")).unwrap();
        assert!(matches!(
            command,
            Command::Grant {
                resource_type: ResourceType::Profile,
                ttl_hours: Some(t),
                ..
            } if t == 2.5
        ));
    }

    #[test]
    fn parses_audit_variants() {
        assert_eq!(
            Command::parse(&args("audit")).unwrap(),
            Command::Audit {
                principal: None,
                limit: None
            }
        );
        assert!(matches!(
            Command::parse(&args("audit alice 5")).unwrap(),
            Command::Audit { limit: Some(5), .. }
        ));
    }

    #[test]
    fn audit_limit_without_principal_filter() {
        let all_five = Command::Audit {
            principal: None,
            limit: Some(5),
        };
        assert_eq!(Command::parse(&args("audit --limit 5")).unwrap(), all_five);
        assert_eq!(Command::parse(&args("audit - 5")).unwrap(), all_five);
        assert_eq!(Command::parse(&args("audit * 5")).unwrap(), all_five);
        assert!(Command::parse(&args("audit --limit many")).is_err());

        let service = SecurityService::in_memory(SecurityConfig::default());
        for who in ["alice", "bob", "carol"] {
            service.check(&Principal::from(who), "rec1", AccessRight::Read);
        }
        let events = Command::parse(&args("audit --limit 2"))
            .unwrap()
            .run(&service)
            .unwrap();
        assert_eq!(events.as_array().unwrap().len(), 2);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args("frobnicate")).is_err());
        assert!(Command::parse(&args("score")).is_err());
        assert!(Command::parse(&args("audit alice many")).is_err());
        assert!(Command::parse(&args("check alice rec1 admin")).is_err());
        assert!(Command::parse(&args("revoke alice not-a-uuid")).is_err());
    }

    #[test]
    fn read_only_commands_do_not_mutate() {
        assert!(!Command::parse(&args("score alice")).unwrap().mutates());
        assert!(Command::parse(&args("check alice rec1 read")).unwrap().mutates());
    }

    #[test]
    fn grant_check_revoke_through_commands() {
        let service = SecurityService::in_memory(SecurityConfig::default());

        let granted = Command::parse(&args("grant alice bob rec1 read"))
            .unwrap()
            .run(&service)
            .unwrap();
        let id = granted["permissionId"].as_str().unwrap().to_owned();

        let check = Command::parse(&args("check BOB rec1 read")).unwrap();
        assert_eq!(check.clone().run(&service).unwrap()["allowed"], true);

        Command::parse(&args(&format!("revoke alice {id}")))
            .unwrap()
            .run(&service)
            .unwrap();
        assert_eq!(check.run(&service).unwrap()["allowed"], false);

        let score = Command::parse(&args("score bob")).unwrap().run(&service).unwrap();
        assert!(score["score"].as_u64().unwrap() <= 100);
    }

    #[test]
    fn encrypt_then_decrypt_through_commands() {
        let service = SecurityService::in_memory(SecurityConfig::default());
        let sealed = Command::parse(&args("encrypt alice hello"))
            .unwrap()
            .run(&service)
            .unwrap();
        let envelope = sealed["envelope"].as_str().unwrap().to_owned();

        let opened = Command::parse(&args(&format!("decrypt alice {envelope}")))
            .unwrap()
            .run(&service)
            .unwrap();
        assert_eq!(opened["plaintext"], "hello");
    }
}
