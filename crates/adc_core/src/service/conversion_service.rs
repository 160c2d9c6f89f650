//! Conversion records: plain CRUD with no rules of their own.

use crate::model::conversion::Conversion;
use crate::service::base_service::BaseService;

pub type ConversionService<R> = BaseService<Conversion, R>;
