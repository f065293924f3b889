//! Registry of hand-authored proxy types.
//!
//! A synthesized class cannot derive from a runtime type directly; it derives from the
//! proxy registered for that type instead. Proxies are keyed by the generic definition of
//! the type they stand in for.

use ce_core::collections::ConcurrentMap;
use ce_core::error::{Error, ErrorKind, Result};
use ce_core::runtime::{
    RtType, RtTypeKind, TypeDescriptor, TypeLoader, PLAIN_PROXY, PROXY_MARKER, PROXY_NAMESPACE,
    PROXY_OF_ATTRIBUTE,
};
use ce_core::validation_bail;
use ce_reflect::{Metadata, Type, TypeShape};
use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

pub struct ProxyRegistry {
    loader: Arc<dyn TypeLoader>,
    proxies: ConcurrentMap<RtType, RtType>,
}

/// A runtime type a source type derives from or implements, with whatever of its
/// arguments could be resolved outside an instantiation.
struct Signature {
    definition: RtType,
    arguments: Vec<Option<RtType>>,
}

impl ProxyRegistry {
    pub fn new(loader: Arc<dyn TypeLoader>) -> Self {
        Self {
            loader,
            proxies: ConcurrentMap::new(),
        }
    }

    fn marker(&self) -> Result<RtType> {
        self.loader
            .load(&TypeDescriptor::new(PROXY_NAMESPACE, PROXY_MARKER, 0))
    }

    fn plain_proxy(&self) -> Result<RtType> {
        self.loader
            .load(&TypeDescriptor::new(PROXY_NAMESPACE, PLAIN_PROXY, 0))
    }

    /// Validate `proxy` and register it for the type named by its proxy annotation.
    pub fn register(&self, proxy: &RtType) -> Result<()> {
        if proxy.kind != RtTypeKind::Class || proxy.is_abstract {
            validation_bail!("proxy {} must be a concrete class", proxy);
        }
        if proxy.is_constructed() && proxy.contains_generic_parameters() {
            validation_bail!("proxy {} is only partially instantiated", proxy);
        }
        let annotations = proxy
            .attributes
            .iter()
            .filter(|attribute| attribute.name == PROXY_OF_ATTRIBUTE)
            .collect_vec();
        let proxee = match annotations.as_slice() {
            [] => validation_bail!("proxy {} carries no {} annotation", proxy, PROXY_OF_ATTRIBUTE),
            [annotation] => match annotation.arguments.as_slice() {
                [proxee] => proxee.generic_definition(),
                _ => validation_bail!(
                    "the {} annotation on {} must name exactly one type",
                    PROXY_OF_ATTRIBUTE,
                    proxy
                ),
            },
            _ => validation_bail!("proxy {} carries more than one {} annotation", proxy, PROXY_OF_ATTRIBUTE),
        };

        let marker = self.marker()?;
        let interfaces = proxy
            .declared_interfaces()
            .iter()
            .map(RtType::generic_definition)
            .collect_vec();
        let implements = |ty: &RtType| interfaces.iter().any(|interface| interface == ty);
        if proxee.is_interface() {
            if interfaces.len() != 2 || !implements(&marker) || !implements(&proxee) {
                validation_bail!(
                    "interface proxy {} must implement exactly {} and {}",
                    proxy,
                    proxee,
                    marker
                );
            }
        } else {
            let base = proxy.declared_base().map(|base| base.generic_definition());
            if base.as_ref() != Some(&proxee) {
                validation_bail!("class proxy {} must derive directly from {}", proxy, proxee);
            }
            if interfaces.len() != 1 || !implements(&marker) {
                validation_bail!("class proxy {} must implement only {}", proxy, marker);
            }
        }

        if let Some(existing) = self.proxies.get_cloned(&proxee) {
            validation_bail!("{} already has the proxy {}", proxee, existing);
        }
        self.proxies.insert(proxee.clone(), proxy.clone());
        debug!(proxy = %proxy, proxee = %proxee, "registered proxy");
        Ok(())
    }

    /// Proxy registered for the definition of `proxee`.
    pub fn lookup(&self, proxee: &RtType) -> Option<RtType> {
        self.proxies.get_cloned(&proxee.generic_definition())
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// The proxy a synthesized `source` type derives from: the one registered for its base
    /// or for one of its interfaces, or the plain object proxy when nothing matches.
    pub fn get_proxy_type(&self, metadata: &Metadata, source: &Type) -> Result<RtType> {
        let mut candidates = Vec::new();
        if let Some(base) = metadata.base_type(source)? {
            if !base.is_source() {
                candidates.push(signature(metadata, &base)?);
            }
        }
        for interface in metadata.interfaces(source)? {
            if !interface.is_source() {
                candidates.push(signature(metadata, &interface)?);
            }
        }
        let matched = candidates
            .into_iter()
            .filter_map(|signature| self.lookup(&signature.definition).map(|proxy| (proxy, signature)))
            .collect_vec();
        match matched.len() {
            0 => self.plain_proxy(),
            1 => {
                let (proxy, signature) = matched.into_iter().next().ok_or_else(|| Error::state("proxy match vanished"))?;
                debug!(source = %source, proxy = %proxy, "matched proxy");
                self.instantiate(&proxy, &signature)
            }
            _ => validation_bail!(
                "ambiguous proxy match for {}: {}",
                source,
                matched.iter().map(|(proxy, _)| proxy.to_string()).join(", ")
            ),
        }
    }

    /// Bind the proxy's own parameters from the arguments of the matched signature, by
    /// where each parameter appears in the proxy's reference to its proxee.
    fn instantiate(&self, proxy: &RtType, signature: &Signature) -> Result<RtType> {
        if !proxy.is_generic_type_definition() {
            return Ok(proxy.clone());
        }
        let reference = if signature.definition.is_interface() {
            proxy
                .declared_interfaces()
                .into_iter()
                .find(|interface| interface.generic_definition() == signature.definition)
        } else {
            proxy.declared_base()
        }
        .ok_or_else(|| Error::state(format!("proxy {} does not reference {}", proxy, signature.definition)))?;

        let arguments = proxy
            .generic_parameters
            .iter()
            .map(|parameter| {
                reference
                    .generic_arguments()
                    .iter()
                    .position(|argument| argument == parameter)
                    .and_then(|index| signature.arguments.get(index).cloned().flatten())
                    .unwrap_or_else(|| parameter.clone())
            })
            .collect_vec();
        self.loader.make_generic(proxy, arguments)
    }
}

fn signature(metadata: &Metadata, ty: &Type) -> Result<Signature> {
    let definition = match ty.shape() {
        TypeShape::Constructed { definition, .. } => definition.clone(),
        _ => ty.clone(),
    };
    let definition = metadata.resolve_type(&definition, None)?.generic_definition();
    let mut arguments = Vec::new();
    if ty.is_constructed() {
        for argument in ty.generic_arguments() {
            arguments.push(match metadata.resolve_type(argument, None) {
                Ok(resolved) => Some(resolved),
                Err(err) if err.kind() == ErrorKind::Resolution => None,
                Err(err) => return Err(err),
            });
        }
    }
    Ok(Signature {
        definition,
        arguments,
    })
}
