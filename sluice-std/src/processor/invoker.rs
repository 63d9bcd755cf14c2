use super::parameter::{ParameterConverter, ParameterConverterBuilder};
use crate::conversion::AutoCollectionConversionService;
use sluice_core::{
    CONVERSION_SERVICE_REFERENCE, ConversionError, ConversionService, DynAroundInterceptor,
    InterfaceToCall, MediaType, Message, MessagingError, MethodInvocation, MethodTarget, Payload,
    ReferenceSearchService, ReferenceSearchServiceExt,
};
use std::sync::Arc;

/// Calls a [`MethodTarget`] for a message.
///
/// Built once per handler: parameter converters are matched to the target's
/// parameters by name and validated up front. For each message the invoker
/// extracts and converts arguments, then runs the around-interceptor chain
/// ending in the target.
///
/// With no converters declared and a single parameter, the parameter receives
/// the whole message if it is typed as a message, otherwise the payload.
pub struct MethodInvoker {
    target: MethodTarget,
    converters: Vec<ParameterConverter>,
    conversion: Arc<dyn ConversionService>,
    interceptors: Arc<[Arc<dyn DynAroundInterceptor>]>,
}

impl MethodInvoker {
    /// Validate converters against `target` and resolve their references.
    ///
    /// The conversion service is looked up under
    /// [`CONVERSION_SERVICE_REFERENCE`]; without one only pass-through
    /// arguments are possible.
    pub fn create(
        target: MethodTarget,
        converters: &[ParameterConverterBuilder],
        interceptors: Vec<Arc<dyn DynAroundInterceptor>>,
        references: &dyn ReferenceSearchService,
    ) -> Result<Self, MessagingError> {
        let converters = ordered_converters(target.interface(), converters)?
            .iter()
            .map(|builder| builder.build(references))
            .collect::<Result<Vec<_>, _>>()?;

        let conversion: Arc<dyn ConversionService> = if references.has(CONVERSION_SERVICE_REFERENCE) {
            let shared = references.get_typed::<Arc<dyn ConversionService>>(CONVERSION_SERVICE_REFERENCE)?;
            Arc::clone(shared.as_ref())
        } else {
            Arc::new(AutoCollectionConversionService::empty())
        };

        Ok(Self {
            target,
            converters,
            conversion,
            interceptors: interceptors.into(),
        })
    }

    /// The operation being called.
    pub fn interface(&self) -> &InterfaceToCall {
        self.target.interface()
    }

    /// Resolve arguments from `message` and call the target through the
    /// interceptor chain.
    pub async fn invoke(&self, message: Message) -> Result<Option<Payload>, MessagingError> {
        let arguments = self.arguments(&message)?;
        tracing::trace!(target_method = %self.interface(), message_id = %message.id(), "invoking");
        MethodInvocation::new(
            self.target.clone(),
            arguments,
            message,
            Arc::clone(&self.interceptors),
        )
        .proceed()
        .await
    }

    fn arguments(&self, message: &Message) -> Result<Vec<Payload>, MessagingError> {
        let message_media = message.headers().content_type().unwrap_or_default();
        let object_media = MediaType::rust_object();

        self.interface()
            .parameters()
            .iter()
            .zip(&self.converters)
            .map(|(parameter, converter)| {
                let target_type = parameter.type_descriptor();
                let raw = converter.extract(target_type, message)?;
                if converter.skips_conversion() || raw.is_null() {
                    return Ok(raw);
                }

                let (source_type, source_media) = if converter.is_payload_converter() {
                    let declared = message_media.type_parameter();
                    let source_type = declared.unwrap_or_else(|| raw.type_descriptor().clone());
                    (source_type, message_media.clone())
                } else {
                    (raw.type_descriptor().clone(), object_media.clone())
                };

                if source_media.is_compatible_with(&object_media) && target_type.accepts(&source_type) {
                    return Ok(raw.retyped(source_type));
                }
                if self
                    .conversion
                    .can_convert(&source_type, &source_media, target_type, &object_media)
                {
                    return Ok(self.conversion.convert(
                        &raw,
                        &source_type,
                        &source_media,
                        target_type,
                        &object_media,
                    )?);
                }
                Err(ConversionError::Unsupported {
                    source_type: source_type.to_string(),
                    source_media: source_media.to_string(),
                    target_type: target_type.to_string(),
                    target_media: object_media.to_string(),
                }
                .into())
            })
            .collect()
    }
}

/// Match converters to parameters by name, applying the single-parameter
/// default.
fn ordered_converters(
    interface: &InterfaceToCall,
    converters: &[ParameterConverterBuilder],
) -> Result<Vec<ParameterConverterBuilder>, ConversionError> {
    let parameters = interface.parameters();
    if converters.is_empty() && parameters.len() == 1 {
        let parameter = &parameters[0];
        return Ok(vec![if parameter.type_descriptor().is_message() {
            ParameterConverterBuilder::message(parameter.name())
        } else {
            ParameterConverterBuilder::payload(parameter.name())
        }]);
    }

    if converters.len() != parameters.len() {
        return Err(ConversionError::ParameterCountMismatch {
            interface: interface.to_string(),
            expected: parameters.len(),
            actual: converters.len(),
        });
    }

    parameters
        .iter()
        .map(|parameter| {
            converters
                .iter()
                .find(|c| c.parameter_name() == parameter.name())
                .cloned()
                .ok_or_else(|| ConversionError::MissingParameterConverter {
                    interface: interface.to_string(),
                    parameter: parameter.name().to_string(),
                })
        })
        .collect()
}
