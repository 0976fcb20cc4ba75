//! Cluster certificate authority and the credentials it signs.

use std::net::IpAddr;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose, RcgenError, SanType,
};
use tracing::debug;

/// Names the API server answers to inside the cluster
pub const API_SERVER_NAMES: [&str; 3] = ["kubernetes", "kubernetes.default", "kubernetes.default.svc"];

#[derive(thiserror::Error, Debug)]
pub enum PkiError {
    #[error("Certificate generation failed")]
    Generation(#[from] RcgenError),
    #[error("\"{0}\" is not a valid IP address")]
    InvalidAddress(String),
}

/// Who a certificate is issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin,
    ApiServer,
    Service(String),
}

impl Identity {
    pub fn common_name(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::ApiServer => "kube-apiserver",
            Self::Service(name) => name,
        }
    }

    fn organization(&self) -> Option<&'static str> {
        match self {
            Self::Admin => Some("system:masters"),
            _ => None,
        }
    }

    /// The API server is reachable by its service names and, once known, by
    /// the control plane address. Services are addressed by their own name.
    pub fn subject_alt_names(&self, master_ip: Option<&str>) -> Result<Vec<SanType>, PkiError> {
        match self {
            Self::Admin => Ok(Vec::new()),
            Self::ApiServer => {
                let mut names: Vec<SanType> = API_SERVER_NAMES
                    .iter()
                    .map(|name| SanType::DnsName(name.to_string()))
                    .collect();
                if let Some(ip) = master_ip {
                    let address: IpAddr = ip
                        .parse()
                        .map_err(|_| PkiError::InvalidAddress(ip.to_owned()))?;
                    names.push(SanType::IpAddress(address));
                }
                Ok(names)
            }
            Self::Service(name) => Ok(vec![SanType::DnsName(name.clone())]),
        }
    }

    fn extended_key_usages(&self) -> Vec<ExtendedKeyUsagePurpose> {
        match self {
            Self::Admin => vec![ExtendedKeyUsagePurpose::ClientAuth],
            Self::ApiServer => vec![ExtendedKeyUsagePurpose::ServerAuth],
            Self::Service(_) => vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth,
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub identity: Identity,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Self-signed root for one cluster
pub struct CertificateAuthority {
    cert: Certificate,
    cert_pem: String,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority").finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    pub fn generate(cluster_name: &str) -> Result<Self, PkiError> {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "kelproject.com");
        dn.push(DnType::CommonName, format!("{cluster_name} cluster ca"));

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::CrlSign, KeyUsagePurpose::KeyCertSign];

        let cert = Certificate::from_params(params)?;
        let cert_pem = cert.serialize_pem()?;
        debug!(cluster_name, "generated cluster ca");
        Ok(Self { cert, cert_pem })
    }

    pub fn certificate_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn private_key_pem(&self) -> String {
        self.cert.serialize_private_key_pem()
    }

    pub fn issue(
        &self,
        identity: Identity,
        master_ip: Option<&str>,
    ) -> Result<IssuedCredential, PkiError> {
        let mut dn = DistinguishedName::new();
        if let Some(organization) = identity.organization() {
            dn.push(DnType::OrganizationName, organization);
        }
        dn.push(DnType::CommonName, identity.common_name());

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.subject_alt_names = identity.subject_alt_names(master_ip)?;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = identity.extended_key_usages();

        let cert = Certificate::from_params(params)?;
        let certificate_pem = cert.serialize_pem_with_signer(&self.cert)?;
        debug!(common_name = identity.common_name(), "issued certificate");
        Ok(IssuedCredential {
            certificate_pem,
            private_key_pem: cert.serialize_private_key_pem(),
            identity,
        })
    }
}

/// Root of trust plus the credentials every cluster starts with
#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    pub ca_pem: String,
    pub admin: IssuedCredential,
    pub api_server: IssuedCredential,
}

impl ClusterCredentials {
    pub fn issue(ca: &CertificateAuthority, master_ip: Option<&str>) -> Result<Self, PkiError> {
        Ok(Self {
            ca_pem: ca.certificate_pem().to_owned(),
            admin: ca.issue(Identity::Admin, master_ip)?,
            api_server: ca.issue(Identity::ApiServer, master_ip)?,
        })
    }
}
